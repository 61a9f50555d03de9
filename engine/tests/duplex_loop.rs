//! End-to-end loop scenarios on a simulated clock and device.
//!
//! The simulated clock makes every wakeup exact, so schedules, corrections
//! and gap recovery can be asserted deterministically.

mod support;

use duplex_engine::{DuplexLoop, Error, RunOptions};
use support::{SimChannel, SimClock};

fn options(period: usize, repetitions: u32) -> RunOptions {
    RunOptions {
        period,
        repetitions,
        memory_map: true,
        simulate_late_wakeup: false,
    }
}

#[test]
fn steady_state_completes_exact_repetitions() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(48_000),
        SimChannel::player(48_000),
        SimClock::default(),
    );
    duplex
        .read_write(options(1024, 4))
        .expect("steady-state run");

    // Two completions per period boundary, no drift: nothing to correct.
    assert_eq!(duplex.in_correction().correction(), 0);
    assert_eq!(duplex.out_correction().correction(), 0);
    // The fourth completion lands at the second period boundary; the
    // trailing sleep advances one more period before the loop exits.
    assert_eq!(duplex.sync_frames(), 3 * 1024);
}

#[test]
fn zero_repetitions_exits_after_initialization() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(48_000),
        SimChannel::player(48_000),
        SimClock::default(),
    );
    duplex.read_write(options(1024, 0)).expect("empty run");

    // Initialization ran: both schedules are primed, the clock never moved.
    assert!(duplex.input().has_buffers());
    assert!(duplex.output().has_buffers());
    assert_eq!(duplex.sync_frames(), 0);
}

#[test]
fn simulated_late_wakeups_recover() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(48_000),
        SimChannel::player(48_000),
        SimClock::default(),
    );
    let opts = RunOptions {
        simulate_late_wakeup: true,
        ..options(1024, 16)
    };
    duplex.read_write(opts).expect("run with injected stalls");

    // The stall at the 7th block adds the simulated delay on top of the
    // step-aligned catch-up; the schedule reset absorbs it.
    assert!(duplex.sync_frames() >= 7 * 1024 + 8 * 1024);
    assert_eq!(duplex.in_correction().correction(), 0);
    assert_eq!(duplex.out_correction().correction(), 0);
}

#[test]
fn late_wakeup_recovers_within_two_periods() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(48_000),
        SimChannel::player(48_000),
        SimClock::default(),
    );
    let opts = RunOptions {
        simulate_late_wakeup: true,
        ..options(1024, 20)
    };
    duplex.read_write(opts).expect("run with injected stalls");

    // Back in steady state after the reset: the loop clock sits exactly on
    // a period boundary again and both schedules extend past it.
    let sync = duplex.sync_frames();
    assert_eq!(sync % 1024, 0);
    assert!(duplex.input().period_end() > sync);
    assert!(duplex.output().period_end() > sync);
}

#[test]
fn sample_rate_mismatch_fails_before_scheduling() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(44_100),
        SimChannel::player(48_000),
        SimClock::default(),
    );
    let err = duplex.read_write(options(1024, 4)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {err:?}");

    // The mismatch is caught before any buffer is enqueued.
    assert!(!duplex.input().has_buffers());
    assert!(!duplex.output().has_buffers());
}

#[test]
fn stepping_mismatch_fails_before_scheduling() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(48_000).with_stepping(32),
        SimChannel::player(48_000),
        SimClock::default(),
    );
    let err = duplex.read_write(options(1024, 4)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {err:?}");
    assert!(!duplex.input().has_buffers());
    assert!(!duplex.output().has_buffers());
}

#[test]
fn ninety_six_khz_run_completes() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(96_000),
        SimChannel::player(96_000),
        SimClock::default(),
    );
    duplex.read_write(options(1024, 2)).expect("96 kHz run");
}

#[test]
fn wrong_input_direction_fails_immediately() {
    let mut duplex = DuplexLoop::new(
        SimChannel::player(48_000),
        SimChannel::player(48_000),
        SimClock::default(),
    );
    let err = duplex.read_write(options(1024, 4)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {err:?}");
    assert!(!duplex.output().has_buffers());
}

#[test]
fn wrong_output_direction_fails_immediately() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(48_000),
        SimChannel::recorder(48_000),
        SimClock::default(),
    );
    let err = duplex.read_write(options(1024, 4)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {err:?}");
}

#[test]
fn device_failure_aborts_the_run() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(48_000).failing_after(3),
        SimChannel::player(48_000),
        SimClock::default(),
    );
    let err = duplex.read_write(options(1024, 64)).unwrap_err();
    assert!(matches!(err, Error::Device(_)), "got {err:?}");
}

#[test]
fn period_equal_to_stepping_makes_progress() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(48_000),
        SimChannel::player(48_000),
        SimClock::default(),
    );
    duplex
        .read_write(options(16, 6))
        .expect("stepping-sized periods");
    assert!(duplex.sync_frames() >= 3 * 16);
}

#[test]
fn drifting_recorder_is_slewed_back() {
    let mut duplex = DuplexLoop::new(
        SimChannel::recorder(48_000).with_drift(100),
        SimChannel::player(48_000),
        SimClock::default(),
    );
    duplex.read_write(options(1024, 40)).expect("drifted run");

    // A device running 100 frames ahead stays inside the loss window, so
    // the filter walks the deadline back a frame or two per period.
    let correction = duplex.in_correction().correction();
    assert!(correction < 0, "correction {correction} must pull back");
    assert!(correction >= -100);
    // The clean playback side has nothing to correct.
    assert_eq!(duplex.out_correction().correction(), 0);
}
