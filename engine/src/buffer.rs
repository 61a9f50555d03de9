/// One period worth of interleaved sample bytes plus a transfer cursor.
///
/// Buffers move by value between the caller and the double buffer: enqueued
/// with a deadline, handed back once the device has transferred every byte.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    data: Vec<u8>,
    pos: usize,
    frame_size: usize,
}

impl Buffer {
    /// Allocate a zeroed buffer holding `frames` frames of `frame_size` bytes.
    pub fn with_frames(frames: usize, frame_size: usize) -> Self {
        Self {
            data: vec![0_u8; frames * frame_size],
            pos: 0,
            frame_size: frame_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes still to transfer.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// True once every byte has been transferred.
    pub fn done(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Rewind the cursor without touching the data.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Zero the data and rewind the cursor.
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.pos = 0;
    }

    /// Advance the cursor by up to `bytes`, returning the actual advance.
    pub fn advance(&mut self, bytes: usize) -> usize {
        let n = bytes.min(self.remaining());
        self.pos += n;
        n
    }

    /// The untransferred tail of the buffer.
    pub fn position(&mut self) -> &mut [u8] {
        let pos = self.pos;
        &mut self.data[pos..]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn frame_capacity(&self) -> i64 {
        (self.data.len() / self.frame_size) as i64
    }

    pub fn frames_done(&self) -> i64 {
        (self.pos / self.frame_size) as i64
    }

    pub fn remaining_frames(&self) -> i64 {
        (self.remaining() / self.frame_size) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_tracks_transfers() {
        let mut buf = Buffer::with_frames(4, 8);
        assert_eq!(buf.len(), 32);
        assert_eq!(buf.frame_capacity(), 4);
        assert!(!buf.done());

        assert_eq!(buf.advance(16), 16);
        assert_eq!(buf.frames_done(), 2);
        assert_eq!(buf.remaining_frames(), 2);

        // Advancing past the end clamps.
        assert_eq!(buf.advance(100), 16);
        assert!(buf.done());
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn clear_zeroes_and_rewinds() {
        let mut buf = Buffer::with_frames(2, 4);
        buf.position()[0] = 0xab;
        buf.advance(8);
        assert!(buf.done());

        buf.clear();
        assert!(!buf.done());
        assert_eq!(buf.remaining(), 8);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn reset_keeps_data() {
        let mut buf = Buffer::with_frames(2, 4);
        buf.as_mut_slice()[3] = 0x7f;
        buf.advance(8);
        buf.reset();
        assert_eq!(buf.as_slice()[3], 0x7f);
        assert_eq!(buf.remaining(), 8);
    }
}
