use crate::buffer::Buffer;
use crate::channel::Channel;
use crate::clock::Clock;
use crate::correction::Correction;
use crate::double_buffer::DoubleBuffer;
use crate::error::{Error, Result};
use tracing::{info, warn};

/// Frames the loop may fall behind both schedules before the drift filter is
/// abandoned and the buffers are re-anchored.
const GAP_LIMIT: i64 = 1024;

/// Simulated late-wakeup injection: every 8th 1024-frame block sleeps an
/// extra 8 periods of 1024 frames.
const SIM_BLOCK: i64 = 1024;
const SIM_DELAY: i64 = 8 * 1024;

const DRIFT_LIMIT: i64 = 64;
const SYNC_GROUP: i32 = 0;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Scheduling quantum in frames.
    pub period: usize,
    /// Total per-channel period completions, summed across both channels.
    pub repetitions: u32,
    /// Map the device rings when the hardware supports it.
    pub memory_map: bool,
    /// Inject artificial late wakeups to exercise gap recovery.
    pub simulate_late_wakeup: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            period: 1024,
            repetitions: 0,
            memory_map: true,
            simulate_late_wakeup: false,
        }
    }
}

/// Drives a recording and a playback channel period by period against one
/// frame clock.
///
/// Both channels run on double-buffered schedules; each completed period is
/// measured against the clock and the next deadline is shifted by the drift
/// correction. A wakeup later than both schedules by more than [`GAP_LIMIT`]
/// abandons the schedule and re-anchors both channels.
pub struct DuplexLoop<R: Channel, W: Channel, K: Clock> {
    clock: K,
    sync_frames: i64,
    gap: i64,
    input: DoubleBuffer<R>,
    output: DoubleBuffer<W>,
    in_correction: Correction,
    out_correction: Correction,
}

impl<R: Channel, W: Channel, K: Clock> DuplexLoop<R, W, K> {
    pub fn new(input: R, output: W, clock: K) -> Self {
        Self {
            clock,
            sync_frames: 0,
            gap: 0,
            input: DoubleBuffer::new(input),
            output: DoubleBuffer::new(output),
            in_correction: Correction::default(),
            out_correction: Correction::default(),
        }
    }

    pub fn input(&self) -> &DoubleBuffer<R> {
        &self.input
    }

    pub fn output(&self) -> &DoubleBuffer<W> {
        &self.output
    }

    pub fn in_correction(&self) -> &Correction {
        &self.in_correction
    }

    pub fn out_correction(&self) -> &Correction {
        &self.out_correction
    }

    /// Current loop time in frames.
    pub fn sync_frames(&self) -> i64 {
        self.sync_frames
    }

    pub fn close(&mut self) {
        self.input.close();
        self.output.close();
    }

    /// Run `options.repetitions` period completions of synchronous duplex
    /// I/O. Any failure aborts the run; no partial success exists.
    pub fn read_write(&mut self, options: RunOptions) -> Result<()> {
        if !self.input.recording() {
            warn!("in device not in recording mode");
            return Err(Error::Config("in device not in recording mode".into()));
        }
        if !self.output.playback() {
            warn!("out device not in playback mode");
            return Err(Error::Config("out device not in playback mode".into()));
        }
        if options.memory_map && self.input.can_memory_map() && !self.input.memory_map() {
            warn!("in device not memory mapped");
            return Err(Error::Config("in device not memory mapped".into()));
        }
        if options.memory_map && self.output.can_memory_map() && !self.output.memory_map() {
            warn!("out device not memory mapped");
            return Err(Error::Config("out device not memory mapped".into()));
        }
        if self.input.sample_rate() != self.output.sample_rate() {
            warn!(
                in_rate = self.input.sample_rate(),
                out_rate = self.output.sample_rate(),
                "recording sample rate differs from playback"
            );
            return Err(Error::Config("sample rates do not match".into()));
        }
        if self.input.stepping() != self.output.stepping() {
            warn!(
                in_step = self.input.stepping(),
                out_step = self.output.stepping(),
                "recording stepping differs from playback"
            );
            return Err(Error::Config("stepping does not match".into()));
        }

        let period = options.period as i64;
        info!(
            period = options.period,
            ns = self.clock.frames_to_time(period),
            "period time"
        );
        info!(
            stepping = self.input.stepping(),
            ns = self.clock.frames_to_time(self.input.stepping()),
            "step time"
        );

        // Two period buffers per direction, deadlines one and two periods out.
        let mut in_frames = period;
        self.input
            .set_buffer(Buffer::with_frames(options.period, self.input.frame_size()), in_frames);
        in_frames += period;
        self.input
            .set_buffer(Buffer::with_frames(options.period, self.input.frame_size()), in_frames);
        let mut out_frames = period;
        self.output
            .set_buffer(Buffer::with_frames(options.period, self.output.frame_size()), out_frames);
        out_frames += period;
        self.output
            .set_buffer(Buffer::with_frames(options.period, self.output.frame_size()), out_frames);

        self.in_correction.set_drift_limit(DRIFT_LIMIT);
        self.out_correction.set_drift_limit(DRIFT_LIMIT);

        if !self.input.add_to_sync_group(SYNC_GROUP) || !self.output.add_to_sync_group(SYNC_GROUP)
        {
            return Err(Error::Config("failed to join sync group".into()));
        }
        if !self.input.start_sync_group(SYNC_GROUP) {
            return Err(Error::Config("failed to start sync group".into()));
        }
        if !self.clock.init(self.input.sample_rate()) {
            return Err(Error::Clock("monotonic clock unavailable".into()));
        }

        let mut finished = 0_u32;
        while finished < options.repetitions {
            self.process()?;

            if self.input.finished(self.sync_frames) {
                self.in_correction.correct(self.input.balance(), 0);
                if self.sync_frames + period != in_frames {
                    info!(
                        sync_frames = self.sync_frames,
                        off_schedule = in_frames - period - self.sync_frames,
                        balance = self.input.balance(),
                        correction = self.in_correction.correction(),
                        "in period finished"
                    );
                }
                if let Some(mut buffer) = self.input.take_buffer() {
                    // Period fully captured; a real consumer would read it here.
                    buffer.clear();
                    in_frames += period;
                    self.input
                        .set_buffer(buffer, in_frames + self.in_correction.correction());
                }
                finished += 1;
            }
            if self.output.finished(self.sync_frames) {
                self.out_correction.correct(self.output.balance(), 0);
                if self.sync_frames + period != out_frames {
                    info!(
                        sync_frames = self.sync_frames,
                        off_schedule = out_frames - period - self.sync_frames,
                        balance = self.output.balance(),
                        correction = self.out_correction.correction(),
                        "out period finished"
                    );
                }
                if let Some(mut buffer) = self.output.take_buffer() {
                    // Silence; a real producer would fill the next period here.
                    buffer.clear();
                    out_frames += period;
                    self.output
                        .set_buffer(buffer, out_frames + self.out_correction.correction());
                }
                finished += 1;
            }

            self.sleep(&options)?;
            if self.gap > 0 {
                warn!(gap = self.gap, "gap too large, schedule reset");
                in_frames += self.gap;
                out_frames += self.gap;
                self.gap = 0;
            }
        }

        self.input.memory_unmap();
        self.output.memory_unmap();
        Ok(())
    }

    /// Transfer whatever both devices accept right now, at most one period
    /// per channel.
    fn process(&mut self) -> Result<()> {
        if self.input.wakeup_time(self.sync_frames) <= self.sync_frames {
            self.input.process(self.sync_frames)?;
        }
        if self.output.wakeup_time(self.sync_frames) <= self.sync_frames {
            self.output.process(self.sync_frames)?;
        }
        self.input.log_state(self.sync_frames);
        self.output.log_state(self.sync_frames);
        Ok(())
    }

    /// Advance the loop clock to the next actionable instant, realign after
    /// a late wakeup, and detect schedule gaps.
    fn sleep(&mut self, options: &RunOptions) -> Result<()> {
        let wakeup = self
            .input
            .wakeup_time(self.sync_frames)
            .min(self.output.wakeup_time(self.sync_frames));
        if wakeup > self.sync_frames {
            let mut sim_delay = 0;
            if options.simulate_late_wakeup && (self.sync_frames / SIM_BLOCK) % 8 == 7 {
                sim_delay = SIM_DELAY;
                warn!(frames = sim_delay, "simulating late wakeup");
            }
            if !self.clock.sleep(wakeup + sim_delay) {
                return Err(Error::Clock("sleep failed".into()));
            }
            self.sync_frames = wakeup;
        }

        let now = self
            .clock
            .now()
            .ok_or_else(|| Error::Clock("monotonic clock read failed".into()))?;
        // A late wakeup leaves sync_frames between two device interrupts;
        // catch up in whole steps so wakeup intervals stay step-aligned.
        let sync_diff = now - self.sync_frames;
        let stepping = self.input.stepping();
        if sync_diff > stepping {
            let rounded = sync_diff - (sync_diff % stepping);
            info!(late = sync_diff, corrected = rounded, "late wakeup");
            self.sync_frames += rounded;
        }

        self.gap = (self.sync_frames - self.input.period_end())
            .max(self.sync_frames - self.output.period_end())
            .max(0);
        if self.gap > GAP_LIMIT {
            self.input.reset_buffers(self.input.end_frames() + self.gap);
            self.output
                .reset_buffers(self.output.end_frames() + self.gap);
        } else {
            self.gap = 0;
        }
        Ok(())
    }
}

impl<R: Channel, W: Channel, K: Clock> Drop for DuplexLoop<R, W, K> {
    fn drop(&mut self) {
        self.close();
    }
}
