use crate::buffer::Buffer;

/// Contract the loop requires of a device channel.
///
/// A channel is one direction of a dsp node: it reports its configuration,
/// exposes the kernel's frame pointer, and moves bytes between a [`Buffer`]
/// and the device. Scheduling lives in [`DoubleBuffer`](crate::DoubleBuffer);
/// implementations only transfer what the device will accept right now.
pub trait Channel {
    /// Direction affirmation.
    fn recording(&self) -> bool {
        false
    }

    /// Direction affirmation.
    fn playback(&self) -> bool {
        false
    }

    /// Frames per second.
    fn sample_rate(&self) -> u32;

    /// Bytes per frame.
    fn frame_size(&self) -> usize;

    /// Minimum transfer granularity in frames.
    fn stepping(&self) -> i64;

    fn can_memory_map(&self) -> bool;

    /// Map the device ring for DMA access. Returns false on failure.
    fn memory_map(&mut self) -> bool;

    fn memory_unmap(&mut self);

    /// Join a kernel sync group for a synchronous start across devices.
    fn add_to_sync_group(&mut self, group: i32) -> bool;

    /// Fire the synchronous start. Only one group member needs to call this.
    fn start_sync_group(&mut self, group: i32) -> bool;

    /// Device frame pointer: frames transferred by the hardware since the
    /// synchronized start, as observed by the most recent `transfer`.
    fn position(&self) -> i64;

    /// Frames the device would hand over (record) or accept (playback) if
    /// `transfer` were called at `sync_frames`.
    fn ready_frames(&self, sync_frames: i64) -> i64;

    /// Move available bytes between the device and `buffer`, bounded by the
    /// buffer. `end_frame` is the absolute frame at which the buffer's last
    /// sample lands. Refreshes `position`.
    fn transfer(
        &mut self,
        buffer: &mut Buffer,
        end_frame: i64,
        sync_frames: i64,
    ) -> std::io::Result<()>;

    /// Release all device resources. Further transfers fail.
    fn close(&mut self);
}
