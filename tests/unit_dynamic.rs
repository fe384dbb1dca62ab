#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use pressurize::domain::ResourceKind;
use pressurize::dynamic::{ControllerError, DynamicController};
use pressurize::lib_mem::MemoryStore;
use pressurize::probe::{ProbeError, ResourceProbe};

/// Probe that replays a fixed sequence of free-space readings, repeating
/// the last one once exhausted.
struct ScriptedProbe {
    values: Vec<u64>,
    calls: usize,
}

impl ScriptedProbe {
    fn new(values: Vec<u64>) -> Self {
        Self { values, calls: 0 }
    }
}

impl ResourceProbe for ScriptedProbe {
    fn free_bytes(&mut self) -> Result<u64, ProbeError> {
        let value = self.values[self.calls.min(self.values.len() - 1)];
        self.calls += 1;
        Ok(value)
    }
}

/// Probe that works once, then fails forever.
struct FlakyProbe {
    calls: usize,
}

impl ResourceProbe for FlakyProbe {
    fn free_bytes(&mut self) -> Result<u64, ProbeError> {
        self.calls += 1;
        if self.calls == 1 {
            Ok(1_000_000)
        } else {
            Err(ProbeError {
                resource: ResourceKind::Memory,
                reason: "query failed".into(),
            })
        }
    }
}

fn assert_invariants(controller: &DynamicController<ScriptedProbe, MemoryStore>) {
    let state = controller.state();
    assert_eq!(
        state.held_bytes(),
        state.segment_sizes().iter().sum::<u64>()
    );
    if state.held_bytes() > 0 {
        assert_eq!(state.segment_ids().first(), Some(&0));
    }
}

#[tokio::test]
async fn initialize_creates_floor_segment() {
    let probe = ScriptedProbe::new(vec![1_000_000]);
    let mut controller = DynamicController::new(probe, MemoryStore, 50.0);
    controller.initialize().await.expect("ok");
    // 1_000_000 * 0.5 * 0.95
    assert_eq!(controller.state().held_bytes(), 475_000);
    assert_eq!(controller.state().segment_count(), 1);
    assert_invariants(&controller);
    controller.teardown().await;
    assert_eq!(controller.state().held_bytes(), 0);
    assert_eq!(controller.state().segment_count(), 0);
}

#[tokio::test]
async fn grows_by_one_segment_when_target_rises() {
    let probe = ScriptedProbe::new(vec![1_000_000, 2_000_000]);
    let mut controller = DynamicController::new(probe, MemoryStore, 50.0);
    controller.initialize().await.expect("ok");
    controller.run_tick().await;
    // 2_000_000 * 0.5 * 0.95
    assert_eq!(controller.state().held_bytes(), 950_000);
    assert_eq!(controller.state().segment_count(), 2);
    assert_invariants(&controller);
    controller.teardown().await;
}

#[tokio::test]
async fn shrinks_from_tail_keeping_floor() {
    let probe = ScriptedProbe::new(vec![500_000, 1_000_000, 200_000]);
    let mut controller = DynamicController::new(probe, MemoryStore, 80.0);
    // 500_000 * 0.8 * 0.95
    controller.initialize().await.expect("ok");
    assert_eq!(controller.state().held_bytes(), 380_000);
    // 1_000_000 * 0.8 * 0.95 = 760_000: grow
    controller.run_tick().await;
    assert_eq!(controller.state().segment_count(), 2);
    // 200_000 * 0.8 * 0.95 = 152_000: shrink, but the floor survives
    controller.run_tick().await;
    assert_eq!(controller.state().segment_count(), 1);
    assert_eq!(controller.state().segment_ids(), vec![0]);
    assert!(controller.state().held_bytes() >= 152_000);
    assert_invariants(&controller);
    // target still below held with only the floor left: nothing to remove
    controller.run_tick().await;
    assert_eq!(controller.state().segment_count(), 1);
    assert_invariants(&controller);
    controller.teardown().await;
}

#[tokio::test]
async fn zero_target_is_insufficient() {
    let probe = ScriptedProbe::new(vec![0]);
    let mut controller = DynamicController::new(probe, MemoryStore, 80.0);
    let error = controller.initialize().await.expect_err("must fail");
    assert!(matches!(
        error,
        ControllerError::InsufficientResource {
            resource: ResourceKind::Memory
        }
    ));
    assert_eq!(controller.state().segment_count(), 0);
}

#[tokio::test]
async fn probe_failure_skips_cycle() {
    let probe = FlakyProbe { calls: 0 };
    let mut controller = DynamicController::new(probe, MemoryStore, 50.0);
    controller.initialize().await.expect("ok");
    let held = controller.state().held_bytes();
    controller.run_tick().await;
    assert_eq!(controller.state().held_bytes(), held);
    assert_eq!(controller.state().segment_count(), 1);
    controller.teardown().await;
}

#[tokio::test]
async fn run_tears_down_on_cancellation() {
    use tokio_util::sync::CancellationToken;

    let probe = ScriptedProbe::new(vec![1_000_000]);
    let controller = DynamicController::new(probe, MemoryStore, 50.0);
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(controller.run(cancel.clone()));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    cancel.cancel();
    worker.await.expect("join");
}
