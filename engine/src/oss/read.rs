use super::device::Dsp;
use crate::buffer::Buffer;
use crate::channel::Channel;

/// Record direction of a dsp node.
///
/// `position` is the frame count the hardware has captured since the
/// synchronized start; `consumed` how much of it has been copied into
/// period buffers. The difference is what a transfer may move right now.
#[derive(Debug)]
pub struct OssReadChannel {
    dsp: Dsp,
    position: i64,
    consumed: i64,
}

impl OssReadChannel {
    pub fn open(path: &str, rate: u32, bits: u32, period_frames: usize) -> std::io::Result<Self> {
        Ok(Self {
            dsp: Dsp::open(path, rate, bits, true, period_frames)?,
            position: 0,
            consumed: 0,
        })
    }

    fn refresh_position(&mut self) -> std::io::Result<()> {
        if self.dsp.mapped() {
            self.position += self.dsp.advance_map_progress()?;
        } else {
            self.position = self.consumed + self.dsp.fifo_frames();
        }
        Ok(())
    }
}

impl Channel for OssReadChannel {
    fn recording(&self) -> bool {
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
            (self.position - self.consumed).max(0)
        } else {
            self.dsp.fifo_frames()
        }
    }

    fn transfer(
        &mut self,
        buffer: &mut Buffer,
        _end_frame: i64,
        _sync_frames: i64,
    ) -> std::io::Result<()> {
        if self.dsp.is_closed() {
            return Err(std::io::Error::other("read channel closed"));
        }
        self.refresh_position()?;
        let available = (self.position - self.consumed).max(0);
        let want = available.min(buffer.remaining_frames());
        if want <= 0 {
            return Ok(());
        }
        let frame_size = self.dsp.frame_size();
        let bytes = want as usize * frame_size;
        let moved = if self.dsp.mapped() {
            // Oldest unread data sits `available` frames behind the DMA cursor.
            let offset = self.consumed;
            let dst = buffer.position();
            self.dsp.read_map(dst, offset, bytes)
        } else {
            let dst = buffer.position();
            self.dsp.read(dst, bytes)?
        };
        let advanced = buffer.advance(moved);
        self.consumed += (advanced / frame_size) as i64;
        Ok(())
    }

    fn close(&mut self) {
        self.dsp.close();
    }
}
