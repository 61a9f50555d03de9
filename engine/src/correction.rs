/// Drift correction for one channel, relative to the frame clock or to a
/// master channel.
///
/// Produces a signed frame offset which the loop adds to the deadline of the
/// next enqueued buffer. Small drift is slewed at most one frame at a time
/// through a moving average, which goes unnoticed in the audio. Large
/// discrepancies like packet loss on a USB interface exceed `loss_max` and
/// are corrected rigorously in a single step.
#[derive(Debug, Clone, Copy)]
pub struct Correction {
    loss_max: i64,
    drift_max: i64,
    correction: i64,
    average_offset: i64,
}

impl Default for Correction {
    fn default() -> Self {
        Self {
            loss_max: 128,
            drift_max: 64,
            correction: 0,
            average_offset: 0,
        }
    }
}

impl Correction {
    /// Balance threshold for small drift corrections, in frames.
    pub fn set_drift_limit(&mut self, drift_max: i64) {
        self.drift_max = drift_max.max(0);
    }

    /// Hard limit for balance discrepancy before a rigorous step, in frames.
    pub fn set_loss_limit(&mut self, loss_max: i64) {
        self.loss_max = loss_max.max(0);
    }

    pub fn correction(&self) -> i64 {
        self.correction
    }

    /// Calculate a new correction parameter.
    ///
    /// `balance` is the corrected channel's position relative to the clock,
    /// `target` the balance of a master channel acting as reference (zero
    /// when correcting against the clock alone).
    pub fn correct(&mut self, balance: i64, target: i64) -> i64 {
        let offset = target - balance;
        self.average_offset = (self.average_offset + offset) / 2;
        if offset - self.correction < -self.loss_max || offset - self.correction > self.loss_max {
            self.correction = offset;
        } else {
            self.correction += (self.average_offset - self.correction) / (self.drift_max + 1);
        }
        self.correction
    }

    /// Clear the correction parameter, keeping the thresholds.
    pub fn clear(&mut self) {
        self.correction = 0;
    }
}
