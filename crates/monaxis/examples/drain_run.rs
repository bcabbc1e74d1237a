//! Drives one axis to completion: queue a burst of writes against future
//! slots, tick until the request-drain policy stops the clock, then walk
//! the committed history back through reconstruction.

use std::ops::ControlFlow;
use std::sync::Arc;

use monaxis::{
    AxisConfig, AxisError, ConflictPolicy, StateChangeDesc, StateKey, StateValue,
    TerminationConfig, TimeAxis,
};

fn main() -> monaxis::Result<()> {
    let axis = TimeAxis::create(AxisConfig {
        anchor_interval: 4,
        max_anchors: 8,
        termination: Some(TerminationConfig {
            terminate_on_request_drain: true,
            safety_cap: 1_000,
            ..TerminationConfig::default()
        }),
        ..AxisConfig::default()
    })?;
    let group = axis.create_group(ConflictPolicy::LastWriter)?;

    axis.set_commit_callback(Some(Arc::new(|slot, changes| {
        println!("committed slot {slot} with {changes} change(s)");
    })));

    // Ten writes spread over the next ten slots, plus one conflict on
    // slot 3 that the last writer wins.
    for slot in 1..=10u64 {
        axis.submit(StateChangeDesc::set(
            slot,
            group,
            StateKey::new(slot, 0),
            StateValue::Uint(slot * 100),
        ))?;
    }
    axis.submit(StateChangeDesc::set(
        3,
        group,
        StateKey::new(3, 0),
        StateValue::Uint(999),
    ))?;

    // Tick until the drain policy fires.
    loop {
        match axis.tick() {
            Ok(()) => {}
            Err(AxisError::Terminated) => break,
            Err(err) => return Err(err),
        }
    }
    println!(
        "axis terminated at slot {} ({:?})",
        axis.current_slot(),
        axis.last_termination_reason()
    );

    // Walk a past slot back out of the anchor history.
    let slot = 3;
    let key = axis.reconstruction_key(slot)?;
    axis.verify_reconstruction_key(&key)?;
    println!("slot {slot} replays from anchor {}:", key.anchor_id);
    axis.reconstruct(slot, None, |key, value| {
        println!("  key {:#x} = {}", key.primary, value.bits());
        ControlFlow::Continue(())
    })?;

    println!("engine counters: {}", axis.metrics());
    Ok(())
}
