use crate::buffer::Buffer;
use crate::channel::Channel;
use tracing::trace;

#[derive(Debug)]
struct Slot {
    buffer: Buffer,
    end_frame: i64,
}

/// Two period buffers in flight ahead of a channel.
///
/// The front slot is being transferred by the device, the back slot is
/// queued behind it. Each slot carries the absolute frame at which its last
/// sample lands. Keeping a second slot queued lets the device keep
/// transferring across a period boundary while the caller reacts to the
/// completed front.
pub struct DoubleBuffer<C: Channel> {
    channel: C,
    front: Option<Slot>,
    back: Option<Slot>,
    sync_stamp: i64,
}

impl<C: Channel> DoubleBuffer<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            front: None,
            back: None,
            sync_stamp: 0,
        }
    }

    /// Enqueue a buffer with its deadline. Fails when both slots are
    /// occupied, or when the deadline does not increase on the queued slot.
    pub fn set_buffer(&mut self, buffer: Buffer, end_frame: i64) -> bool {
        if self.back.is_some() {
            return false;
        }
        let slot = Slot { buffer, end_frame };
        match &self.front {
            None => self.front = Some(slot),
            Some(front) => {
                if end_frame <= front.end_frame {
                    return false;
                }
                self.back = Some(slot);
            }
        }
        true
    }

    /// Dequeue the front slot and promote the back slot. The caller checks
    /// `finished` first.
    pub fn take_buffer(&mut self) -> Option<Buffer> {
        let slot = self.front.take()?;
        self.front = self.back.take();
        Some(slot.buffer)
    }

    pub fn has_buffers(&self) -> bool {
        self.front.is_some()
    }

    /// True when the front slot's deadline has passed and the device has
    /// transferred all of its frames.
    pub fn finished(&self, sync_frames: i64) -> bool {
        match &self.front {
            Some(front) => front.end_frame <= sync_frames && front.buffer.done(),
            None => false,
        }
    }

    /// Transfer as much as the device accepts right now: the front slot,
    /// then the back slot once the front has drained.
    pub fn process(&mut self, sync_frames: i64) -> std::io::Result<()> {
        self.sync_stamp = sync_frames;
        if let Some(front) = self.front.as_mut() {
            self.channel
                .transfer(&mut front.buffer, front.end_frame, sync_frames)?;
            if front.buffer.done() {
                if let Some(back) = self.back.as_mut() {
                    self.channel
                        .transfer(&mut back.buffer, back.end_frame, sync_frames)?;
                }
            }
        }
        Ok(())
    }

    /// The channel's position relative to the loop clock. Positive means the
    /// device runs ahead of where the clock predicts it.
    pub fn balance(&self) -> i64 {
        self.channel.position() - self.sync_stamp
    }

    /// Deadline of the furthest queued slot.
    pub fn period_end(&self) -> i64 {
        match (&self.back, &self.front) {
            (Some(back), _) => back.end_frame,
            (None, Some(front)) => front.end_frame,
            (None, None) => 0,
        }
    }

    /// Deadline of the front slot; anchor for a schedule reset.
    pub fn end_frames(&self) -> i64 {
        self.front.as_ref().map_or(0, |front| front.end_frame)
    }

    /// Next frame instant at which `process` must run for this channel.
    pub fn wakeup_time(&self, sync_frames: i64) -> i64 {
        let Some(front) = &self.front else {
            return i64::MAX;
        };
        if front.buffer.done() {
            // Nothing left to move; wake when the deadline passes.
            return front.end_frame;
        }
        if self.channel.ready_frames(sync_frames) > 0 {
            // Residual frames can be transferred immediately.
            return sync_frames;
        }
        // Remaining frames land when the device reaches the deadline,
        // shifted by however far it runs ahead or behind the clock.
        front.end_frame - self.balance()
    }

    /// Discard the current schedule and re-anchor both slots at `end_frames`
    /// and one period after it. Used after a gap too large to correct.
    pub fn reset_buffers(&mut self, end_frames: i64) {
        if let Some(front) = self.front.as_mut() {
            front.buffer.clear();
            front.end_frame = end_frames;
        }
        if let Some(back) = self.back.as_mut() {
            back.buffer.clear();
            back.end_frame = end_frames + back.buffer.frame_capacity();
        }
    }

    pub fn log_state(&self, sync_frames: i64) {
        trace!(
            sync_frames,
            front_end = self.front.as_ref().map_or(0, |s| s.end_frame),
            front_remaining = self.front.as_ref().map_or(0, |s| s.buffer.remaining_frames()),
            back_end = self.back.as_ref().map_or(0, |s| s.end_frame),
            balance = self.balance(),
            position = self.channel.position(),
            "channel state"
        );
    }

    // Forwarded channel methods.

    pub fn recording(&self) -> bool {
        self.channel.recording()
    }

    pub fn playback(&self) -> bool {
        self.channel.playback()
    }

    pub fn sample_rate(&self) -> u32 {
        self.channel.sample_rate()
    }

    pub fn frame_size(&self) -> usize {
        self.channel.frame_size()
    }

    pub fn stepping(&self) -> i64 {
        self.channel.stepping()
    }

    pub fn can_memory_map(&self) -> bool {
        self.channel.can_memory_map()
    }

    pub fn memory_map(&mut self) -> bool {
        self.channel.memory_map()
    }

    pub fn memory_unmap(&mut self) {
        self.channel.memory_unmap()
    }

    pub fn add_to_sync_group(&mut self, group: i32) -> bool {
        self.channel.add_to_sync_group(group)
    }

    pub fn start_sync_group(&mut self, group: i32) -> bool {
        self.channel.start_sync_group(group)
    }

    pub fn close(&mut self) {
        self.channel.close()
    }
}
