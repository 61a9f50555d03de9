use super::device::Dsp;
use crate::buffer::Buffer;
use crate::channel::Channel;

/// Playback direction of a dsp node.
///
/// `position` is the frame count the hardware has played since the
/// synchronized start; `written` how far ahead of it the period buffers
/// have been queued. Writes are bounded by the device ring.
#[derive(Debug)]
pub struct OssWriteChannel {
    dsp: Dsp,
    position: i64,
    written: i64,
}

impl OssWriteChannel {
    pub fn open(path: &str, rate: u32, bits: u32, period_frames: usize) -> std::io::Result<Self> {
        Ok(Self {
            dsp: Dsp::open(path, rate, bits, false, period_frames)?,
            position: 0,
            written: 0,
        })
    }

    fn refresh_position(&mut self) -> std::io::Result<()> {
        if self.dsp.mapped() {
            self.position += self.dsp.advance_map_progress()?;
        } else {
            self.position = self.written - self.dsp.fifo_frames();
        }
        Ok(())
    }
}

impl Channel for OssWriteChannel {
    fn playback(&self) -> bool {
        true
    }

    fn sample_rate(&self) -> u32 {
        self.dsp.sample_rate()
    }

    fn frame_size(&self) -> usize {
        self.dsp.frame_size()
    }

    fn stepping(&self) -> i64 {
        self.dsp.stepping()
    }

    fn can_memory_map(&self) -> bool {
        self.dsp.can_memory_map()
    }

    fn memory_map(&mut self) -> bool {
        self.dsp.memory_map()
    }

    fn memory_unmap(&mut self) {
        self.dsp.memory_unmap()
    }

    fn add_to_sync_group(&mut self, group: i32) -> bool {
        self.dsp.add_to_sync_group(group)
    }

    fn start_sync_group(&mut self, group: i32) -> bool {
        self.dsp.start_sync_group(group)
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn ready_frames(&self, _sync_frames: i64) -> i64 {
        if self.dsp.mapped() {
            (self.dsp.buffer_frames() - (self.written - self.position)).max(0)
        } else {
            (self.dsp.buffer_frames() - self.dsp.fifo_frames()).max(0)
        }
    }

    fn transfer(
        &mut self,
        buffer: &mut Buffer,
        _end_frame: i64,
        _sync_frames: i64,
    ) -> std::io::Result<()> {
        if self.dsp.is_closed() {
            return Err(std::io::Error::other("write channel closed"));
        }
        self.refresh_position()?;
        let space = (self.dsp.buffer_frames() - (self.written - self.position)).max(0);
        let want = space.min(buffer.remaining_frames());
        if want <= 0 {
            return Ok(());
        }
        let frame_size = self.dsp.frame_size();
        let bytes = want as usize * frame_size;
        let moved = if self.dsp.mapped() {
            self.dsp.write_map(buffer.position(), self.written, bytes)
        } else {
            self.dsp.write(buffer.position(), bytes)?
        };
        let advanced = buffer.advance(moved);
        self.written += (advanced / frame_size) as i64;
        Ok(())
    }

    fn close(&mut self) {
        self.dsp.close();
    }
}
