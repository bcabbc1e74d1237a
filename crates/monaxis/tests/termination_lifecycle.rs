//! Termination policy lifecycle: the policy lock, the built-in
//! conditions in evaluation order, and the irreversibility of the
//! Terminated state.

use std::sync::Arc;

use monaxis::{
    signal, AxisConfig, AxisError, Lifecycle, StateChangeDesc, StateKey, StateValue,
    TerminationConfig, TerminationReason, TimeAxis,
};

fn axis_with(termination: TerminationConfig) -> TimeAxis {
    TimeAxis::create(AxisConfig {
        worker_thread_count: 2,
        termination: Some(termination),
        ..AxisConfig::default()
    })
    .expect("axis")
}

fn set(slot: u64, key: u64, value: u64) -> StateChangeDesc {
    StateChangeDesc::set(slot, 0, StateKey::new(key, 0), StateValue::Uint(value))
}

#[test]
fn policy_setters_are_locked_and_hash_is_stable() {
    let axis = axis_with(TerminationConfig {
        step_limit: 100,
        ..TerminationConfig::default()
    });
    let hash_before = axis.termination_policy_hash();

    assert_eq!(axis.set_termination_step_limit(5), Err(AxisError::PolicyLocked));
    assert_eq!(
        axis.set_termination_on_request_drain(true),
        Err(AxisError::PolicyLocked)
    );
    assert_eq!(
        axis.set_termination_on_group_resolution(true),
        Err(AxisError::PolicyLocked)
    );
    assert_eq!(
        axis.set_termination_on_external_signal(0b1),
        Err(AxisError::PolicyLocked)
    );
    assert_eq!(
        axis.set_termination_safety_cap(9),
        Err(AxisError::PolicyLocked)
    );
    assert_eq!(
        axis.set_termination_custom_callback(Arc::new(|_ctx| true)),
        Err(AxisError::PolicyLocked)
    );
    assert_eq!(
        axis.set_termination_config(&TerminationConfig::default()),
        Err(AxisError::PolicyLocked)
    );

    assert_eq!(axis.termination_policy_hash(), hash_before);
    // The frozen config is still readable.
    assert_eq!(axis.termination_config().step_limit, 100);
}

#[test]
fn policy_hash_distinguishes_axes_with_different_semantics() {
    let a = axis_with(TerminationConfig {
        step_limit: 100,
        ..TerminationConfig::default()
    });
    let b = axis_with(TerminationConfig {
        step_limit: 200,
        ..TerminationConfig::default()
    });
    let c = axis_with(TerminationConfig {
        step_limit: 100,
        ..TerminationConfig::default()
    });
    assert_ne!(a.termination_policy_hash(), b.termination_policy_hash());
    assert_eq!(a.termination_policy_hash(), c.termination_policy_hash());
}

#[test]
fn step_limit_terminates_and_terminated_axis_rejects_ticks() {
    let axis = axis_with(TerminationConfig {
        step_limit: 3,
        safety_cap: 1000,
        ..TerminationConfig::default()
    });

    axis.tick().expect("tick 1");
    assert_eq!(axis.lifecycle(), Lifecycle::Running);
    axis.tick().expect("tick 2");
    axis.tick().expect("tick 3");

    assert_eq!(axis.lifecycle(), Lifecycle::Terminated);
    assert_eq!(
        axis.last_termination_reason(),
        Some(TerminationReason::StepLimit)
    );
    assert_eq!(axis.tick(), Err(AxisError::Terminated));
    assert_eq!(axis.current_slot(), 3);
    assert_eq!(axis.tick_multiple(5), Err(AxisError::Terminated));
    assert_eq!(axis.current_slot(), 3);
}

#[test]
fn request_drain_fires_when_the_queue_empties() {
    let axis = axis_with(TerminationConfig {
        terminate_on_request_drain: true,
        safety_cap: 1000,
        ..TerminationConfig::default()
    });
    axis.submit(set(1, 1, 1)).expect("slot 1");
    axis.submit(set(2, 2, 2)).expect("slot 2");

    axis.tick().expect("tick 1");
    // One request still pending: no drain yet.
    assert_eq!(axis.lifecycle(), Lifecycle::Running);
    assert_eq!(axis.termination_context().pending_requests, 1);

    axis.tick().expect("tick 2");
    assert_eq!(axis.lifecycle(), Lifecycle::Terminated);
    assert_eq!(
        axis.last_termination_reason(),
        Some(TerminationReason::RequestDrain)
    );
}

#[test]
fn group_resolution_needs_observed_groups() {
    let axis = axis_with(TerminationConfig {
        terminate_on_group_resolution: true,
        safety_cap: 1000,
        ..TerminationConfig::default()
    });
    // An empty tick observes zero groups and must not terminate.
    axis.tick().expect("empty tick");
    assert_eq!(axis.lifecycle(), Lifecycle::Running);

    axis.submit(set(2, 1, 1)).expect("submit");
    axis.tick().expect("tick with one group");
    assert_eq!(axis.lifecycle(), Lifecycle::Terminated);
    assert_eq!(
        axis.last_termination_reason(),
        Some(TerminationReason::GroupResolution)
    );
}

#[test]
fn external_signal_termination_and_clearing() {
    let axis = axis_with(TerminationConfig {
        required_external_flags: signal::USER_DEFINED_1,
        safety_cap: 1000,
        ..TerminationConfig::default()
    });

    axis.tick().expect("tick without signal");
    assert_eq!(axis.lifecycle(), Lifecycle::Running);

    // Raised then lowered before the next tick: no termination.
    axis.set_external_signal(signal::USER_DEFINED_1);
    axis.clear_external_signal(signal::USER_DEFINED_1);
    axis.tick().expect("tick after clear");
    assert_eq!(axis.lifecycle(), Lifecycle::Running);

    // An unrelated bit does not satisfy the mask.
    axis.set_external_signal(signal::PAUSE_REQUEST);
    axis.tick().expect("tick with unrelated signal");
    assert_eq!(axis.lifecycle(), Lifecycle::Running);

    axis.set_external_signal(signal::USER_DEFINED_1);
    assert_ne!(axis.termination_context().external_flags & signal::USER_DEFINED_1, 0);
    axis.tick().expect("final tick");
    assert_eq!(axis.lifecycle(), Lifecycle::Terminated);
    assert_eq!(
        axis.last_termination_reason(),
        Some(TerminationReason::ExternalSignal)
    );
}

#[test]
fn custom_callback_is_evaluated_last_and_can_terminate() {
    let axis = axis_with(TerminationConfig {
        safety_cap: 1000,
        custom_callback: Some(Arc::new(|ctx| ctx.elapsed_steps >= 2)),
        ..TerminationConfig::default()
    });

    axis.tick().expect("tick 1");
    assert_eq!(axis.lifecycle(), Lifecycle::Running);
    axis.tick().expect("tick 2");
    assert_eq!(axis.lifecycle(), Lifecycle::Terminated);
    assert_eq!(
        axis.last_termination_reason(),
        Some(TerminationReason::CustomCallback)
    );
}

#[test]
fn default_policy_is_a_bare_safety_cap() {
    let axis = TimeAxis::create(AxisConfig {
        worker_thread_count: 2,
        ..AxisConfig::default()
    })
    .expect("axis");
    assert_eq!(axis.termination_config().safety_cap, 10_000);
    assert_eq!(axis.last_termination_reason(), None);

    axis.tick_multiple(50).expect("plenty of headroom");
    assert_eq!(axis.current_slot(), 50);
    assert_eq!(axis.lifecycle(), Lifecycle::Running);
}

#[test]
fn safety_cap_outranks_step_limit_end_to_end() {
    let axis = axis_with(TerminationConfig {
        step_limit: 2,
        safety_cap: 2,
        ..TerminationConfig::default()
    });
    axis.tick().expect("tick 1");
    axis.tick().expect("tick 2");
    assert_eq!(
        axis.last_termination_reason(),
        Some(TerminationReason::SafetyCap)
    );
}

#[test]
fn termination_context_tracks_tick_observations() {
    let axis = axis_with(TerminationConfig {
        safety_cap: 1000,
        ..TerminationConfig::default()
    });
    axis.submit(set(1, 1, 1)).expect("a");
    axis.submit(set(1, 2, 2)).expect("b");
    axis.submit(set(3, 3, 3)).expect("later");
    axis.tick().expect("tick");

    let ctx = axis.termination_context();
    assert_eq!(ctx.elapsed_steps, 1);
    assert_eq!(ctx.pending_requests, 1);
    // Both requests to slot 1 target the same group.
    assert_eq!(ctx.total_groups, 1);
    assert_eq!(ctx.resolved_groups, 1);
    assert!(ctx.causality_summary.is_none());
}

#[test]
fn submissions_are_still_accepted_after_termination() {
    // Termination stops time, not the queue: submissions keep targeting
    // future slots that will simply never commit.
    let axis = axis_with(TerminationConfig {
        step_limit: 1,
        safety_cap: 1000,
        ..TerminationConfig::default()
    });
    axis.tick().expect("terminal tick");
    assert_eq!(axis.lifecycle(), Lifecycle::Terminated);
    axis.submit(set(2, 1, 1)).expect("queued against a stopped clock");
    assert_eq!(axis.pending_request_count(2), 1);
    assert_eq!(axis.tick(), Err(AxisError::Terminated));
}
