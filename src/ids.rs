//! Protocol and action identifier allocation
//!
//! Every window is addressed at the render boundary by a protocol id taken
//! from a finite pool. Action ids are scoped to the owning window's protocol
//! id: the high 32 bits carry the protocol id and the low 32 bits a per-window
//! sequence number, so a raw action coming back from a client can be routed to
//! its window and all of a window's actions can be released in one call.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::IdConfig;
use crate::error::{WindowError, WindowResult};

/// Numeric id addressing a window at the render target.
pub type ProtocolId = u32;

/// Source of protocol ids for new windows.
///
/// The default implementation is [`ProtocolIdPool`]; hosts that share the id
/// space with other displayables can plug in their own allocator.
pub trait IdAllocator: Send {
    /// Takes a free id out of the pool.
    fn allocate_protocol_id(&mut self) -> WindowResult<ProtocolId>;

    /// Returns an id to the pool. Unknown ids are ignored.
    fn free_protocol_id(&mut self, id: ProtocolId);
}

/// Finite protocol id pool that hands out the lowest free id first.
#[derive(Debug, Clone)]
pub struct ProtocolIdPool {
    first: ProtocolId,
    capacity: u32,
    next: ProtocolId,
    released: BTreeSet<ProtocolId>,
    in_use: HashSet<ProtocolId>,
}

impl ProtocolIdPool {
    pub fn new(first: ProtocolId, capacity: u32) -> Self {
        Self {
            first,
            capacity,
            next: first,
            released: BTreeSet::new(),
            in_use: HashSet::new(),
        }
    }

    pub fn from_config(config: &IdConfig) -> Self {
        Self::new(config.first_protocol_id, config.protocol_id_capacity)
    }

    /// Number of ids currently handed out.
    pub fn in_use(&self) -> usize {
        self.in_use.len()
    }

    pub fn is_allocated(&self, id: ProtocolId) -> bool {
        self.in_use.contains(&id)
    }
}

impl IdAllocator for ProtocolIdPool {
    fn allocate_protocol_id(&mut self) -> WindowResult<ProtocolId> {
        let id = if let Some(id) = self.released.pop_first() {
            id
        } else if u64::from(self.next) < u64::from(self.first) + u64::from(self.capacity) {
            let id = self.next;
            self.next += 1;
            id
        } else {
            warn!("Protocol id pool exhausted ({} ids in use)", self.in_use.len());
            return Err(WindowError::ProtocolIdsExhausted {
                capacity: self.capacity,
            });
        };

        self.in_use.insert(id);
        Ok(id)
    }

    fn free_protocol_id(&mut self, id: ProtocolId) {
        if self.in_use.remove(&id) {
            self.released.insert(id);
        } else {
            debug!("Ignoring release of unallocated protocol id {}", id);
        }
    }
}

/// Identifier assigned to a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(u64);

impl ActionId {
    pub fn new(owner: ProtocolId, sequence: u32) -> Self {
        Self((u64::from(owner) << 32) | u64::from(sequence))
    }

    /// Protocol id of the window that issued this action.
    pub fn owner(self) -> ProtocolId {
        (self.0 >> 32) as ProtocolId
    }

    pub fn sequence(self) -> u32 {
        self.0 as u32
    }

    /// Raw value as carried by client action events.
    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner(), self.sequence())
    }
}

/// Hands out action ids per owning protocol id.
///
/// Sequence numbers keep counting when a protocol id is released and handed
/// to a new window, so an action issued by the previous holder never matches
/// a callback of the next one.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    sequences: HashMap<ProtocolId, OwnerSequence>,
    per_window_limit: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct OwnerSequence {
    /// Last sequence number handed out for the protocol id
    last: u32,
    /// Actions issued to the current holder
    issued: u32,
}

impl ActionRegistry {
    pub fn new(per_window_limit: u32) -> Self {
        Self {
            sequences: HashMap::new(),
            per_window_limit,
        }
    }

    pub fn allocate(&mut self, owner: ProtocolId) -> WindowResult<ActionId> {
        let sequence = self.sequences.entry(owner).or_default();
        if sequence.issued >= self.per_window_limit {
            return Err(WindowError::ActionIdsExhausted(owner));
        }
        sequence.last = match sequence.last.checked_add(1) {
            Some(next) => next,
            None => {
                debug!("Action sequence of protocol id {} wrapped", owner);
                1
            }
        };
        sequence.issued += 1;
        Ok(ActionId::new(owner, sequence.last))
    }

    /// Releases every action issued for `owner`.
    pub fn release_all(&mut self, owner: ProtocolId) {
        if let Some(sequence) = self.sequences.get_mut(&owner) {
            sequence.issued = 0;
        }
    }

    /// Number of actions currently issued for `owner`.
    pub fn issued(&self, owner: ProtocolId) -> u32 {
        self.sequences
            .get(&owner)
            .map_or(0, |sequence| sequence.issued)
    }
}
