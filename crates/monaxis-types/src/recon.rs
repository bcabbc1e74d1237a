//! Reconstruction keys.
//!
//! A reconstruction key does not encode state; it encodes *how* to
//! regenerate state from an anchor: which anchor to start from, which slot
//! to reach, and the two hashes that verify the replay path and the
//! determinism of conflict resolution along it. The key alone cannot
//! restore anything; it is only meaningful against an axis whose
//! termination-policy hash matches the one the key was minted under.

use serde::{Deserialize, Serialize};

use crate::SlotIndex;

/// Externalised size of a reconstruction key.
pub const RECONSTRUCTION_KEY_BYTES: usize = 64;

/// Opaque, fixed-size handle describing one replay path.
///
/// Externalised layout (native endianness):
///
/// ```text
/// Offset  Size  Field
///   0       8   anchor_id
///   8       8   target_slot
///  16      16   transition_hash
///  32      16   policy_hash
///  48      16   reserved (zero)
/// ```
///
/// The key is opaque across processes unless both endianness and the
/// axis policy hash match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructionKey {
    /// The anchor replay starts from.
    pub anchor_id: u64,
    /// The slot replay reaches.
    pub target_slot: SlotIndex,
    /// 128-bit fold over the transitions between anchor and target.
    pub transition_hash: [u8; 16],
    /// 128-bit fingerprint of conflict resolution at the base anchor.
    pub policy_hash: [u8; 16],
}

impl ReconstructionKey {
    /// Pack into the externalised 64-byte layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; RECONSTRUCTION_KEY_BYTES] {
        let mut buf = [0u8; RECONSTRUCTION_KEY_BYTES];
        buf[0..8].copy_from_slice(&self.anchor_id.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.target_slot.to_ne_bytes());
        buf[16..32].copy_from_slice(&self.transition_hash);
        buf[32..48].copy_from_slice(&self.policy_hash);
        buf
    }

    /// Unpack from the externalised 64-byte layout.
    #[must_use]
    pub fn from_bytes(buf: &[u8; RECONSTRUCTION_KEY_BYTES]) -> Self {
        let mut anchor_id = [0u8; 8];
        anchor_id.copy_from_slice(&buf[0..8]);
        let mut target_slot = [0u8; 8];
        target_slot.copy_from_slice(&buf[8..16]);
        let mut transition_hash = [0u8; 16];
        transition_hash.copy_from_slice(&buf[16..32]);
        let mut policy_hash = [0u8; 16];
        policy_hash.copy_from_slice(&buf[32..48]);
        Self {
            anchor_id: u64::from_ne_bytes(anchor_id),
            target_slot: SlotIndex::from_ne_bytes(target_slot),
            transition_hash,
            policy_hash,
        }
    }

    /// Unpack from an arbitrary slice; `None` unless it is exactly
    /// [`RECONSTRUCTION_KEY_BYTES`] long.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let fixed: &[u8; RECONSTRUCTION_KEY_BYTES] = buf.try_into().ok()?;
        Some(Self::from_bytes(fixed))
    }
}
