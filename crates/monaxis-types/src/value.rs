//! State keys, values, and mutation kinds.

use serde::{Deserialize, Serialize};

use crate::hash::state_key_hash;

/// Fixed-size key identifying what is being mutated.
///
/// Keys are application-chosen. Two keys with equal [`hash`](Self::hash)
/// are treated as equal; collisions are accepted by contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    /// Primary key component (e.g. an entity id).
    pub primary: u64,
    /// Secondary key component (e.g. a field id).
    pub secondary: u64,
}

impl StateKey {
    /// Create a key from its two components.
    #[must_use]
    pub const fn new(primary: u64, secondary: u64) -> Self {
        Self { primary, secondary }
    }

    /// The 64-bit identity hash of this key.
    #[must_use]
    pub fn hash(&self) -> u64 {
        state_key_hash(self)
    }
}

/// A 64-bit tagged payload.
///
/// Interpretation is the submitter's responsibility; the engine only ever
/// moves the payload and folds its [`bits`](Self::bits) into hashes. The
/// `Handle` variant carries an opaque 64-bit handle the engine never
/// dereferences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    /// Signed integer payload.
    Int(i64),
    /// Unsigned integer payload.
    Uint(u64),
    /// Floating-point payload.
    Float(f64),
    /// Opaque handle payload; lifetime is managed by the submitter.
    Handle(u64),
}

impl StateValue {
    /// The raw 64-bit payload, as folded into change hashes.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn bits(self) -> u64 {
        match self {
            Self::Int(v) => v as u64,
            Self::Uint(v) | Self::Handle(v) => v,
            Self::Float(v) => v.to_bits(),
        }
    }

    /// Signed view of the payload, if this is an `Int`.
    #[must_use]
    pub const fn as_int(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Unsigned view of the payload, if this is a `Uint`.
    #[must_use]
    pub const fn as_uint(self) -> Option<u64> {
        match self {
            Self::Uint(v) => Some(v),
            _ => None,
        }
    }

    /// Floating-point view of the payload, if this is a `Float`.
    #[must_use]
    pub const fn as_float(self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl Default for StateValue {
    fn default() -> Self {
        Self::Uint(0)
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for StateValue {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// How a winning request mutates its key.
///
/// Only `Set` and `Delete` have distinct semantics. `Add`, `Multiply`,
/// and `Custom` are accepted but apply as `Set` of the supplied value; the
/// resolver never reads previous state. `Delete` removes the key from the
/// head-slot store only: committed transitions carry no tombstones, so a
/// deletion is invisible to replay and does not survive reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationType {
    /// Overwrite the key with the supplied value.
    Set,
    /// Accepted; applies as `Set` of the supplied value.
    Add,
    /// Accepted; applies as `Set` of the supplied value.
    Multiply,
    /// Remove the key from the head-slot store. Removing an absent key is
    /// a silent no-op.
    Delete,
    /// Accepted; applies as `Set` of the supplied value.
    Custom,
}

impl MutationType {
    /// Stable numeric code, as folded into transition hashes.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Set => 0,
            Self::Add => 1,
            Self::Multiply => 2,
            Self::Delete => 3,
            Self::Custom => 4,
        }
    }
}
