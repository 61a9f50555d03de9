use super::consts::*;
use super::io_util::{map_read, map_write, read_nonblock, write_nonblock};
use super::ioctl;
use crate::clock::stepping_for_rate;
use nix::libc;
use std::fs::File;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use tracing::{debug, warn};

/// One direction of an OSS dsp node, configured and optionally mapped.
///
/// Holds the negotiated format and the kernel ring geometry; the channel
/// implementations layer position accounting on top.
#[derive(Debug)]
pub struct Dsp {
    file: File,
    input: bool,
    rate: u32,
    channels: usize,
    frame_size: usize,
    buffer_bytes: usize,
    buffer_frames: i64,
    frag_size: usize,
    caps: i32,
    map: *mut libc::c_void,
    mapped: bool,
    map_progress: usize,
    closed: bool,
}

// The raw map pointer is only touched from the control thread.
unsafe impl Send for Dsp {}

fn format_candidates(bits: u32) -> Vec<u32> {
    match bits {
        32 | 24 => vec![AFMT_S32_NE, AFMT_S24_NE, AFMT_S16_NE, AFMT_S8],
        16 => vec![AFMT_S16_NE, AFMT_S8],
        8 => vec![AFMT_S8],
        _ => vec![AFMT_S16_NE, AFMT_S8],
    }
}

impl Dsp {
    /// Open and configure one direction of `path` for `period_frames`-sized
    /// transfers.
    pub fn open(
        path: &str,
        rate: u32,
        bits: u32,
        input: bool,
        period_frames: usize,
    ) -> std::io::Result<Self> {
        let mut options = File::options();
        let mut flags = libc::O_NONBLOCK;
        if input {
            flags |= libc::O_RDONLY;
            options.read(true).write(false).custom_flags(flags);
        } else {
            flags |= libc::O_WRONLY;
            options.read(false).write(true).custom_flags(flags);
        }
        let file = options.open(path)?;
        let fd = file.as_raw_fd();

        let cooked = 0_i32;
        unsafe {
            ioctl::oss_set_cooked(fd, &cooked).map_err(|_| std::io::Error::last_os_error())?;
        }

        let mut format = 0_u32;
        for candidate in format_candidates(bits) {
            let mut negotiated = candidate;
            if unsafe { ioctl::oss_set_format(fd, &mut negotiated) }.is_ok()
                && negotiated == candidate
            {
                format = negotiated;
                break;
            }
        }
        let sample_bytes = bytes_per_sample(format).ok_or_else(|| {
            std::io::Error::other(format!("no usable sample format for {bits} bits"))
        })?;

        let mut channels = 2_i32;
        let mut effective_rate = rate as i32;
        unsafe {
            ioctl::oss_set_channels(fd, &mut channels)
                .map_err(|_| std::io::Error::last_os_error())?;
            ioctl::oss_set_speed(fd, &mut effective_rate)
                .map_err(|_| std::io::Error::last_os_error())?;
        }
        if effective_rate != rate as i32 {
            return Err(std::io::Error::other(format!(
                "device forced sample rate {effective_rate} (requested {rate})"
            )));
        }
        let frame_size = channels as usize * sample_bytes;

        // Fragment size tracks the period so completion interrupts line up
        // with the loop's schedule.
        let frag_bytes = period_frames.saturating_mul(frame_size).max(1);
        let frag_shift = frag_bytes.next_power_of_two().trailing_zeros() as i32;
        let mut frag = (2 << 16) | (frag_shift & 0xffff);
        unsafe {
            ioctl::oss_set_fragment(fd, &mut frag).map_err(|_| std::io::Error::last_os_error())?;
        }

        let mut info = ioctl::BufferInfo::default();
        unsafe {
            if input {
                ioctl::oss_input_buffer_info(fd, &mut info)
                    .map_err(|_| std::io::Error::last_os_error())?;
            } else {
                ioctl::oss_output_buffer_info(fd, &mut info)
                    .map_err(|_| std::io::Error::last_os_error())?;
            }
        }
        if info.bytes < 1 {
            info.bytes = info.fragstotal * info.fragsize;
        }
        if info.bytes < 1 {
            return Err(std::io::Error::other("device reports no buffer space"));
        }

        let mut caps = 0_i32;
        unsafe {
            ioctl::oss_get_caps(fd, &mut caps).map_err(|_| std::io::Error::last_os_error())?;
        }

        let buffer_bytes = info.bytes as usize;
        debug!(
            path,
            input,
            rate = effective_rate,
            channels,
            frame_size,
            buffer_bytes,
            fragsize = info.fragsize,
            "dsp configured"
        );

        Ok(Self {
            file,
            input,
            rate,
            channels: channels as usize,
            frame_size,
            buffer_bytes,
            buffer_frames: (buffer_bytes / frame_size) as i64,
            frag_size: info.fragsize.max(1) as usize,
            caps,
            map: std::ptr::null_mut(),
            mapped: false,
            map_progress: 0,
            closed: false,
        })
    }

    pub fn fd(&self) -> i32 {
        self.file.as_raw_fd()
    }

    pub fn sample_rate(&self) -> u32 {
        self.rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn stepping(&self) -> i64 {
        stepping_for_rate(self.rate)
    }

    pub fn buffer_frames(&self) -> i64 {
        self.buffer_frames
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn can_memory_map(&self) -> bool {
        (self.caps & PCM_CAP_MMAP) != 0
    }

    pub fn memory_map(&mut self) -> bool {
        if self.mapped {
            return true;
        }
        let prot = if self.input {
            libc::PROT_READ
        } else {
            libc::PROT_WRITE
        };
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                self.buffer_bytes,
                prot,
                libc::MAP_SHARED,
                self.fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            warn!(input = self.input, "mmap of device ring failed");
            return false;
        }
        self.map = addr;
        self.mapped = true;
        true
    }

    pub fn memory_unmap(&mut self) {
        if self.mapped && !self.map.is_null() {
            unsafe {
                let _ = libc::munmap(self.map, self.buffer_bytes);
            }
        }
        self.map = std::ptr::null_mut();
        self.mapped = false;
    }

    pub fn mapped(&self) -> bool {
        self.mapped
    }

    pub fn add_to_sync_group(&mut self, group: i32) -> bool {
        ioctl::add_to_sync_group(self.fd(), group, self.input)
    }

    pub fn start_sync_group(&mut self, group: i32) -> bool {
        ioctl::start_sync_group(self.fd(), group)
    }

    /// Advance the mapped DMA cursor from GETIPTR/GETOPTR and return the
    /// advance in frames. The pointer alone is ambiguous once it wraps; the
    /// fragment interrupt count disambiguates whole ring cycles.
    pub fn advance_map_progress(&mut self) -> std::io::Result<i64> {
        let mut info = ioctl::CountInfo::default();
        let rc = if self.input {
            unsafe { ioctl::oss_get_iptr(self.fd(), &mut info) }
        } else {
            unsafe { ioctl::oss_get_optr(self.fd(), &mut info) }
        };
        rc.map_err(|_| std::io::Error::last_os_error())?;
        if info.ptr < 0
            || info.blocks < 0
            || (info.ptr as usize) >= self.buffer_bytes
            || (info.ptr as usize) % self.frame_size != 0
        {
            return Ok(0);
        }
        let ptr = info.ptr as usize;
        let pointer = self.map_progress % self.buffer_bytes;
        let mut delta = (ptr + self.buffer_bytes - pointer) % self.buffer_bytes;
        let max_bytes = ((info.blocks as usize).saturating_add(1))
            .saturating_mul(self.frag_size)
            .saturating_sub(1);
        if max_bytes >= delta {
            let mut cycles = max_bytes - delta;
            cycles -= cycles % self.buffer_bytes;
            delta += cycles;
        }
        self.map_progress += delta;
        Ok((delta / self.frame_size) as i64)
    }

    /// Frames currently queued in the device FIFO (captured and unread, or
    /// written and unplayed).
    pub fn fifo_frames(&self) -> i64 {
        let mut count = ioctl::OssCount::default();
        let rc = if self.input {
            unsafe { ioctl::oss_current_iptr(self.fd(), &mut count) }
        } else {
            unsafe { ioctl::oss_current_optr(self.fd(), &mut count) }
        };
        if rc.is_ok() {
            count.fifo_samples as i64
        } else {
            0
        }
    }

    pub fn read(&self, dst: &mut [u8], len: usize) -> std::io::Result<usize> {
        read_nonblock(self.fd(), dst, len)
    }

    pub fn write(&self, src: &[u8], len: usize) -> std::io::Result<usize> {
        write_nonblock(self.fd(), src, len)
    }

    /// Copy out of the mapped ring at `offset_frames` into the ring.
    pub fn read_map(&self, dst: &mut [u8], offset_frames: i64, len: usize) -> usize {
        let offset = (offset_frames.rem_euclid(self.buffer_frames) as usize) * self.frame_size;
        map_read(self.map, self.buffer_bytes, dst, offset, len)
    }

    /// Copy into the mapped ring at `offset_frames` into the ring.
    pub fn write_map(&self, src: &[u8], offset_frames: i64, len: usize) -> usize {
        let offset = (offset_frames.rem_euclid(self.buffer_frames) as usize) * self.frame_size;
        map_write(self.map, self.buffer_bytes, src, offset, len)
    }

    pub fn close(&mut self) {
        self.memory_unmap();
        self.closed = true;
    }
}

impl Drop for Dsp {
    fn drop(&mut self) {
        self.memory_unmap();
    }
}
