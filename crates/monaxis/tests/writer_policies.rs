//! End-to-end conflict-policy scenarios: first/last writer, priority
//! tie-breaks, custom selectors, and submission boundary behaviour.

use std::ops::ControlFlow;
use std::sync::Arc;

use monaxis::{
    AxisConfig, AxisError, ConflictPolicy, MutationType, StateChangeDesc, StateKey, StateValue,
    TerminationConfig, TimeAxis,
};

fn axis_with_cap(safety_cap: u32) -> TimeAxis {
    TimeAxis::create(AxisConfig {
        worker_thread_count: 2,
        termination: Some(TerminationConfig {
            safety_cap,
            ..TerminationConfig::default()
        }),
        ..AxisConfig::default()
    })
    .expect("axis")
}

fn set(slot: u64, group: u32, key: (u64, u64), value: u64) -> StateChangeDesc {
    StateChangeDesc::set(
        slot,
        group,
        StateKey::new(key.0, key.1),
        StateValue::Uint(value),
    )
}

#[test]
fn first_writer_single_group() {
    let axis = axis_with_cap(1000);
    let group = axis.create_group(ConflictPolicy::FirstWriter).expect("group");

    let first = axis.submit(set(1, group, (10, 0), 7)).expect("first");
    let second = axis.submit(set(1, group, (10, 0), 9)).expect("second");
    assert_eq!(first, 1);
    assert_eq!(second, 2);

    axis.tick().expect("tick");

    assert_eq!(axis.current_slot(), 1);
    assert_eq!(
        axis.query_state(1, &StateKey::new(10, 0)).expect("query"),
        StateValue::Uint(7)
    );
    let stats = axis.stats();
    assert_eq!(stats.total_requests_processed, 2);
    assert_eq!(stats.total_conflicts_resolved, 1);
}

#[test]
fn last_writer_tie_break() {
    let axis = axis_with_cap(1000);
    let group = axis.create_group(ConflictPolicy::LastWriter).expect("group");

    axis.submit(set(1, group, (10, 0), 7)).expect("first");
    axis.submit(set(1, group, (10, 0), 9)).expect("second");
    axis.tick().expect("tick");

    assert_eq!(
        axis.query_state(1, &StateKey::new(10, 0)).expect("query"),
        StateValue::Uint(9)
    );
}

#[test]
fn priority_ties_resolve_to_earlier_submission() {
    let axis = axis_with_cap(1000);
    let group = axis.create_group(ConflictPolicy::Priority).expect("group");

    let mut r1 = set(1, group, (10, 0), 100);
    r1.priority = 5;
    let mut r2 = set(1, group, (10, 0), 200);
    r2.priority = 10;
    let mut r3 = set(1, group, (10, 0), 300);
    r3.priority = 10;
    axis.submit(r1).expect("r1");
    axis.submit(r2).expect("r2");
    axis.submit(r3).expect("r3");
    axis.tick().expect("tick");

    // The priority-10 request with the smaller id wins.
    assert_eq!(
        axis.query_state(1, &StateKey::new(10, 0)).expect("query"),
        StateValue::Uint(200)
    );
}

#[test]
fn custom_selector_picks_winner_and_falls_back_on_error() {
    let axis = axis_with_cap(1000);
    let largest_value = axis
        .create_group_custom(Arc::new(|_gid, descs| {
            (0..descs.len()).max_by_key(|&i| descs[i].value.bits())
        }))
        .expect("custom group");
    let broken = axis
        .create_group_custom(Arc::new(|_gid, _descs| Some(usize::MAX)))
        .expect("broken group");

    axis.submit(set(1, largest_value, (1, 0), 5)).expect("a");
    axis.submit(set(1, largest_value, (1, 0), 50)).expect("b");
    axis.submit(set(1, broken, (2, 0), 5)).expect("c");
    axis.submit(set(1, broken, (2, 0), 50)).expect("d");
    axis.tick().expect("tick");

    assert_eq!(
        axis.query_state(1, &StateKey::new(1, 0)).expect("custom"),
        StateValue::Uint(50)
    );
    // Out-of-range winner index falls back to first writer.
    assert_eq!(
        axis.query_state(1, &StateKey::new(2, 0)).expect("fallback"),
        StateValue::Uint(5)
    );
}

#[test]
fn groups_are_isolation_units() {
    let axis = axis_with_cap(1000);
    let first = axis.create_group(ConflictPolicy::FirstWriter).expect("g0");
    let last = axis.create_group(ConflictPolicy::LastWriter).expect("g1");

    // Same key in both groups; each group resolves independently.
    axis.submit(set(1, first, (3, 0), 1)).expect("a");
    axis.submit(set(1, last, (4, 0), 1)).expect("b");
    axis.submit(set(1, first, (3, 0), 2)).expect("c");
    axis.submit(set(1, last, (4, 0), 2)).expect("d");
    axis.tick().expect("tick");

    assert_eq!(
        axis.query_state(1, &StateKey::new(3, 0)).expect("first"),
        StateValue::Uint(1)
    );
    assert_eq!(
        axis.query_state(1, &StateKey::new(4, 0)).expect("last"),
        StateValue::Uint(2)
    );
}

#[test]
fn unregistered_group_defaults_to_first_writer() {
    let axis = axis_with_cap(1000);
    axis.submit(set(1, 42, (5, 0), 1)).expect("a");
    axis.submit(set(1, 42, (5, 0), 2)).expect("b");
    axis.tick().expect("tick");
    assert_eq!(
        axis.query_state(1, &StateKey::new(5, 0)).expect("query"),
        StateValue::Uint(1)
    );
}

#[test]
fn submit_boundaries() {
    let axis = axis_with_cap(1000);
    let group = axis.create_group(ConflictPolicy::FirstWriter).expect("group");
    axis.tick().expect("tick to slot 1");

    // Exactly current + 1 succeeds; current fails.
    axis.submit(set(2, group, (1, 0), 1)).expect("next slot");
    assert_eq!(
        axis.submit(set(1, group, (1, 0), 1)),
        Err(AxisError::SlotInPast {
            target: 1,
            current: 1
        })
    );
}

#[test]
fn empty_tick_commits_empty_transition() {
    let axis = axis_with_cap(1000);
    axis.tick().expect("empty tick");
    assert_eq!(axis.current_slot(), 1);
    let stats = axis.stats();
    assert_eq!(stats.total_requests_processed, 0);
    assert_eq!(stats.total_conflicts_resolved, 0);
}

#[test]
fn cancelled_request_never_commits() {
    let axis = axis_with_cap(1000);
    let group = axis.create_group(ConflictPolicy::LastWriter).expect("group");
    let keep = axis.submit(set(1, group, (8, 0), 1)).expect("keep");
    let cancel = axis.submit(set(1, group, (8, 0), 2)).expect("cancel");
    axis.cancel(cancel).expect("cancel ok");
    axis.tick().expect("tick");

    // The cancelled (later) writer must not win.
    assert_eq!(
        axis.query_state(1, &StateKey::new(8, 0)).expect("query"),
        StateValue::Uint(1)
    );
    assert_eq!(axis.stats().total_requests_processed, 1);
    // Cancelling after the harvest is NotFound.
    assert_eq!(axis.cancel(keep), Err(AxisError::NotFound));
}

#[test]
fn batch_submission_is_atomic_end_to_end() {
    let axis = axis_with_cap(1000);
    let group = axis.create_group(ConflictPolicy::FirstWriter).expect("group");

    let ids = axis
        .submit_batch(&[set(1, group, (1, 0), 1), set(2, group, (2, 0), 2)])
        .expect("batch");
    assert_eq!(ids, vec![1, 2]);

    let err = axis
        .submit_batch(&[set(1, group, (3, 0), 3), set(0, group, (4, 0), 4)])
        .expect_err("bad batch");
    assert!(matches!(err, AxisError::SlotInPast { .. }));

    axis.tick().expect("tick 1");
    axis.tick().expect("tick 2");
    assert_eq!(
        axis.query_state(2, &StateKey::new(2, 0)).expect("query"),
        StateValue::Uint(2)
    );
    // Nothing from the rejected batch committed.
    assert_eq!(axis.query_state(2, &StateKey::new(3, 0)), Err(AxisError::NotFound));
}

#[test]
fn delete_takes_effect_for_the_head_slot() {
    let axis = axis_with_cap(1000);
    let group = axis.create_group(ConflictPolicy::LastWriter).expect("group");
    axis.submit(set(1, group, (6, 0), 9)).expect("set");
    axis.tick().expect("tick 1");
    assert_eq!(
        axis.query_state(1, &StateKey::new(6, 0)).expect("set value"),
        StateValue::Uint(9)
    );

    let mut delete = set(2, group, (6, 0), 0);
    delete.mutation_type = MutationType::Delete;
    axis.submit(delete).expect("delete");
    // Deleting a key that was never set is a silent no-op.
    let mut absent = set(2, group, (7, 0), 0);
    absent.mutation_type = MutationType::Delete;
    axis.submit(absent).expect("absent delete");
    axis.tick().expect("tick 2");

    assert_eq!(
        axis.query_state(2, &StateKey::new(6, 0)),
        Err(AxisError::NotFound)
    );
}

#[test]
fn add_multiply_custom_mutations_apply_as_set() {
    let axis = axis_with_cap(1000);
    let group = axis.create_group(ConflictPolicy::FirstWriter).expect("group");
    for (slot, mutation) in [
        (1, MutationType::Add),
        (2, MutationType::Multiply),
        (3, MutationType::Custom),
    ] {
        let mut desc = set(slot, group, (1, 0), slot * 10);
        desc.mutation_type = mutation;
        axis.submit(desc).expect("submit");
        axis.tick().expect("tick");
        assert_eq!(
            axis.query_state(slot, &StateKey::new(1, 0)).expect("query"),
            StateValue::Uint(slot * 10)
        );
    }
}

#[test]
fn full_reconstruction_enumerates_committed_state() {
    let axis = axis_with_cap(1000);
    let group = axis.create_group(ConflictPolicy::FirstWriter).expect("group");
    axis.submit(set(1, group, (1, 0), 11)).expect("a");
    axis.submit(set(1, group, (2, 0), 22)).expect("b");
    axis.tick().expect("tick");

    let mut seen = Vec::new();
    axis.reconstruct(1, None, |key, value| {
        seen.push((key.primary, value.bits()));
        ControlFlow::Continue(())
    })
    .expect("reconstruct");
    seen.sort_unstable();
    assert_eq!(seen, vec![(1, 11), (2, 22)]);

    // Early stop is honoured.
    let mut count = 0;
    axis.reconstruct(1, None, |_key, _value| {
        count += 1;
        ControlFlow::Break(())
    })
    .expect("reconstruct with stop");
    assert_eq!(count, 1);
}
