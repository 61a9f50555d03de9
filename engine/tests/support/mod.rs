//! Simulated clock and device for deterministic loop scenarios.

use duplex_engine::buffer::Buffer;
use duplex_engine::channel::Channel;
use duplex_engine::clock::{stepping_for_rate, Clock};
use std::cell::Cell;

/// Virtual monotonic clock: `sleep` jumps straight to the deadline, so a
/// whole run completes in microseconds and every wakeup is exact.
#[derive(Debug, Default)]
pub struct SimClock {
    now: Cell<i64>,
    sample_rate: Cell<u32>,
}

impl Clock for SimClock {
    fn init(&mut self, sample_rate: u32) -> bool {
        if sample_rate == 0 {
            return false;
        }
        self.sample_rate.set(sample_rate);
        self.now.set(0);
        true
    }

    fn now(&self) -> Option<i64> {
        Some(self.now.get())
    }

    fn sleep(&self, deadline: i64) -> bool {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
        true
    }

    fn frames_to_time(&self, frames: i64) -> i64 {
        frames.saturating_mul(1_000_000_000) / self.sample_rate.get().max(1) as i64
    }
}

/// Ideal device that follows the loop clock, with an optional static drift
/// and an optional injected failure.
#[derive(Debug)]
pub struct SimChannel {
    input: bool,
    rate: u32,
    frame_size: usize,
    stepping: i64,
    drift: i64,
    ring_frames: i64,
    position: i64,
    transferred: i64,
    transfers_left: Option<u32>,
    closed: bool,
}

impl SimChannel {
    pub fn recorder(rate: u32) -> Self {
        Self::new(true, rate)
    }

    pub fn player(rate: u32) -> Self {
        Self::new(false, rate)
    }

    fn new(input: bool, rate: u32) -> Self {
        Self {
            input,
            rate,
            frame_size: 8,
            stepping: stepping_for_rate(rate),
            drift: 0,
            ring_frames: 1 << 40,
            position: 0,
            transferred: 0,
            transfers_left: None,
            closed: false,
        }
    }

    /// Run the device `drift` frames ahead of the clock (negative: behind).
    pub fn with_drift(mut self, drift: i64) -> Self {
        self.drift = drift;
        self
    }

    /// Override the interrupt granularity.
    pub fn with_stepping(mut self, stepping: i64) -> Self {
        self.stepping = stepping;
        self
    }

    /// Fail the nth transfer, emulating a device error mid-loop.
    pub fn failing_after(mut self, transfers: u32) -> Self {
        self.transfers_left = Some(transfers);
        self
    }

    fn device_position(&self, sync_frames: i64) -> i64 {
        (sync_frames + self.drift).max(0)
    }
}

impl Channel for SimChannel {
    fn recording(&self) -> bool {
        self.input
    }

    fn playback(&self) -> bool {
        !self.input
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn stepping(&self) -> i64 {
        self.stepping
    }

    fn can_memory_map(&self) -> bool {
        false
    }

    fn memory_map(&mut self) -> bool {
        false
    }

    fn memory_unmap(&mut self) {}

    fn add_to_sync_group(&mut self, _group: i32) -> bool {
        true
    }

    fn start_sync_group(&mut self, _group: i32) -> bool {
        true
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn ready_frames(&self, sync_frames: i64) -> i64 {
        let position = self.device_position(sync_frames);
        if self.input {
            (position - self.transferred).max(0)
        } else {
            (self.ring_frames - (self.transferred - position)).max(0)
        }
    }

    fn transfer(
        &mut self,
        buffer: &mut Buffer,
        _end_frame: i64,
        sync_frames: i64,
    ) -> std::io::Result<()> {
        if self.closed {
            return Err(std::io::Error::other("simulated channel closed"));
        }
        if let Some(left) = &mut self.transfers_left {
            if *left == 0 {
                return Err(std::io::Error::other("simulated device failure"));
            }
            *left -= 1;
        }
        self.position = self.position.max(self.device_position(sync_frames));
        let movable = if self.input {
            (self.position - self.transferred).max(0)
        } else {
            (self.ring_frames - (self.transferred - self.position)).max(0)
        };
        let want = movable.min(buffer.remaining_frames());
        if want > 0 {
            let advanced = buffer.advance(want as usize * buffer.frame_size());
            self.transferred += (advanced / buffer.frame_size()) as i64;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
