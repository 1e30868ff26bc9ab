//! Unit tests for configuration module
//!
//! Tests configuration parsing, validation, serialization/deserialization,
//! and edge cases in configuration handling.

use super::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = WindowingConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.stacking.z_min, -32.0);
    assert_eq!(config.stacking.z_max, 32.0);
    assert!(config.ids.protocol_id_capacity > 0);
    assert_eq!(config.dialog.replace_policy, DialogReplacePolicy::ClosePrevious);
}

#[test]
fn test_default_stacking_has_640_layers() {
    let stacking = StackingConfig::default();

    assert_eq!(stacking.max_depth(), 640);
    assert_eq!(stacking.z_for_depth(0), -32.0);
    assert!((stacking.z_for_depth(10) - -31.0).abs() < 1e-4);
    assert!(stacking.z_for_depth(640) <= stacking.z_max);
}

#[test]
fn test_configuration_serialization_roundtrip() -> Result<()> {
    let original_config = WindowingConfig::default();

    let toml_string = toml::to_string(&original_config)?;
    let deserialized_config: WindowingConfig = toml::from_str(&toml_string)?;

    assert_eq!(original_config.ids, deserialized_config.ids);
    assert_eq!(original_config.dialog, deserialized_config.dialog);
    assert!((original_config.stacking.z_offset - deserialized_config.stacking.z_offset).abs() < 1e-6);

    Ok(())
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("winstack.toml");

    let test_config = r#"
[stacking]
z_min = -10.0
z_max = 10.0
z_offset = 0.5

[ids]
first_protocol_id = 100
protocol_id_capacity = 16
actions_per_window = 32

[dialog]
replace_policy = "reject"

[general]
debug = true
tick_interval_ms = 250
"#;

    fs::write(&file_path, test_config)?;

    let config = WindowingConfig::load(&file_path)?;

    assert_eq!(config.stacking.max_depth(), 40);
    assert_eq!(config.ids.first_protocol_id, 100);
    assert_eq!(config.ids.protocol_id_capacity, 16);
    assert_eq!(config.dialog.replace_policy, DialogReplacePolicy::Reject);
    assert!(config.general.debug);

    // Missing section falls back to defaults
    assert_eq!(config.layout, LayoutConfig::default());

    Ok(())
}

#[test]
fn test_partial_section_uses_field_defaults() -> Result<()> {
    let config: WindowingConfig = toml::from_str("[ids]\nprotocol_id_capacity = 8\n")?;

    assert_eq!(config.ids.protocol_id_capacity, 8);
    assert_eq!(config.ids.first_protocol_id, 1);
    assert_eq!(config.stacking, StackingConfig::default());

    Ok(())
}

#[test]
fn test_malformed_toml_handling() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("malformed_config.toml");

    let malformed_config = r#"
[stacking
z_min = -32.0

[ids]
protocol_id_capacity = "many"
"#;

    fs::write(&file_path, malformed_config).unwrap();

    let result = WindowingConfig::load(&file_path);
    assert!(result.is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let result = WindowingConfig::load(dir.path().join("absent.toml"));
    assert!(result.is_err());
}

#[test]
fn test_configuration_validation() {
    let config = WindowingConfig::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.stacking.z_min = 32.0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.stacking.z_offset = 0.0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.stacking.z_offset = 100.0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ids.protocol_id_capacity = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.ids.first_protocol_id = u32::MAX;
    invalid_config.ids.protocol_id_capacity = 2;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn test_save_and_reload() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("saved.toml");

    let mut config = WindowingConfig::default();
    config.ids.protocol_id_capacity = 64;
    config.dialog.replace_policy = DialogReplacePolicy::Reject;
    config.save(&file_path)?;

    let reloaded = WindowingConfig::load(&file_path)?;
    assert_eq!(reloaded.ids.protocol_id_capacity, 64);
    assert_eq!(reloaded.dialog.replace_policy, DialogReplacePolicy::Reject);

    Ok(())
}

#[test]
fn test_merge_partial_overrides_changed_sections_only() {
    let mut base = WindowingConfig::default();
    base.general.debug = true;

    let mut partial = WindowingConfig::default();
    partial.ids.protocol_id_capacity = 12;

    let merged = base.merge_partial(partial);
    assert_eq!(merged.ids.protocol_id_capacity, 12);
    assert!(merged.general.debug);
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_z_range_validation(z_min in -100.0f32..100.0f32, z_max in -100.0f32..100.0f32) {
            let mut config = WindowingConfig::default();
            config.stacking.z_min = z_min;
            config.stacking.z_max = z_max;
            config.stacking.z_offset = 0.1;

            let result = config.validate();
            if z_max - z_min >= 0.1 {
                prop_assert!(result.is_ok());
            } else if z_min >= z_max {
                prop_assert!(result.is_err());
            }
        }

        #[test]
        fn test_z_for_depth_stays_in_bounds(depth in 0usize..2000) {
            let stacking = StackingConfig::default();
            let z = stacking.z_for_depth(depth);
            prop_assert!(z >= stacking.z_min);
            prop_assert!(z <= stacking.z_max);
        }
    }
}
