//! Termination policy evaluation and lifecycle.
//!
//! A time slot does not end because time passed; it ends because the
//! engine decided there is nothing left, or must stop. The policy is part
//! of the axis definition: frozen at creation, hashed once, evaluated
//! after every tick in a fixed order that is itself part of the semantic
//! identity. Once a condition fires, the lifecycle transitions to
//! `Terminated` and never back.

use monaxis_types::{TerminationConfig, TerminationContext, TerminationReason};

/// Constant folded into the policy hash when a custom callback is
/// present. Presence matters; the callback's identity never does
/// (addresses are not portable across runs).
const CUSTOM_CALLBACK_HASH_MARK: u64 = 0xDEAD_BEEF_CAFE_BABE;

const POLICY_HASH_OFFSET_BASIS: u64 = 0x9E37_79B9_7F4A_7C15;
const POLICY_HASH_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Axis lifecycle. The transition `Running → Terminated` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Lifecycle {
    /// Ticks are accepted.
    Running = 0,
    /// A termination condition fired; every further tick fails without
    /// mutating state.
    Terminated = 1,
}

impl Lifecycle {
    /// Atomic encoding.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Atomic decoding; anything non-zero is `Terminated`.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            _ => Self::Terminated,
        }
    }
}

/// The frozen termination policy: configuration plus its 64-bit hash,
/// both fixed at axis creation.
pub struct TerminationPolicy {
    config: TerminationConfig,
    hash: u64,
}

impl TerminationPolicy {
    /// Freeze a configuration and compute its hash once.
    #[must_use]
    pub fn new(config: TerminationConfig) -> Self {
        let hash = policy_hash(&config);
        Self { config, hash }
    }

    /// The policy's semantic fingerprint. Two axes share termination
    /// semantics iff their hashes match.
    #[must_use]
    pub const fn hash(&self) -> u64 {
        self.hash
    }

    /// The frozen configuration.
    #[must_use]
    pub const fn config(&self) -> &TerminationConfig {
        &self.config
    }

    /// Evaluate the policy against a context snapshot.
    ///
    /// Conditions are visited in a fixed order and the first that fires
    /// wins: safety cap, step limit, request drain, group resolution,
    /// external signal, custom callback. The order is load-bearing; it is
    /// part of the policy's semantic identity.
    #[must_use]
    pub fn evaluate(&self, ctx: &TerminationContext) -> Option<TerminationReason> {
        let config = &self.config;

        if config.safety_cap > 0 && ctx.elapsed_steps >= config.safety_cap {
            return Some(TerminationReason::SafetyCap);
        }
        if config.step_limit > 0 && ctx.elapsed_steps >= config.step_limit {
            return Some(TerminationReason::StepLimit);
        }
        if config.terminate_on_request_drain && ctx.pending_requests == 0 {
            return Some(TerminationReason::RequestDrain);
        }
        if config.terminate_on_group_resolution
            && ctx.total_groups > 0
            && ctx.resolved_groups >= ctx.total_groups
        {
            return Some(TerminationReason::GroupResolution);
        }
        if config.required_external_flags != 0
            && (ctx.external_flags & config.required_external_flags) != 0
        {
            return Some(TerminationReason::ExternalSignal);
        }
        if let Some(callback) = &config.custom_callback {
            if callback(ctx) {
                return Some(TerminationReason::CustomCallback);
            }
        }
        None
    }
}

/// FNV-style fold over the policy configuration.
#[must_use]
pub(crate) fn policy_hash(config: &TerminationConfig) -> u64 {
    let mut hash = POLICY_HASH_OFFSET_BASIS;
    hash ^= u64::from(config.step_limit);
    hash = hash.wrapping_mul(POLICY_HASH_PRIME);
    hash ^= u64::from(config.safety_cap);
    hash = hash.wrapping_mul(POLICY_HASH_PRIME);
    hash ^= u64::from(config.terminate_on_request_drain);
    hash = hash.wrapping_mul(POLICY_HASH_PRIME);
    hash ^= u64::from(config.terminate_on_group_resolution);
    hash = hash.wrapping_mul(POLICY_HASH_PRIME);
    hash ^= u64::from(config.required_external_flags);
    hash = hash.wrapping_mul(POLICY_HASH_PRIME);
    if config.custom_callback.is_some() {
        hash ^= CUSTOM_CALLBACK_HASH_MARK;
    }
    hash
}
