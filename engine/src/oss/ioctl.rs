use super::consts::{PCM_ENABLE_INPUT, PCM_ENABLE_OUTPUT};
use nix::libc;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct BufferInfo {
    pub fragments: libc::c_int,
    pub fragstotal: libc::c_int,
    pub fragsize: libc::c_int,
    pub bytes: libc::c_int,
}

/// GETIPTR/GETOPTR result: DMA pointer plus fragment interrupt count.
#[repr(C)]
#[derive(Debug, Default)]
pub struct CountInfo {
    pub bytes: libc::c_int,
    pub blocks: libc::c_int,
    pub ptr: libc::c_int,
}

/// CURRENT_IPTR/CURRENT_OPTR result: total samples plus FIFO fill level.
#[repr(C)]
#[derive(Debug, Default)]
pub struct OssCount {
    pub samples: i64,
    pub fifo_samples: libc::c_int,
    pub filler: [libc::c_int; 32],
}

#[repr(C)]
#[derive(Debug)]
struct OssSyncGroup {
    id: libc::c_int,
    mode: libc::c_int,
    filler: [libc::c_int; 16],
}

const SNDCTL_DSP_MAGIC: u8 = b'P';
const SNDCTL_DSP_SPEED: u8 = 2;
const SNDCTL_DSP_SETFMT: u8 = 5;
const SNDCTL_DSP_CHANNELS: u8 = 6;
const SNDCTL_DSP_SETFRAGMENT: u8 = 10;
const SNDCTL_DSP_GETOSPACE: u8 = 12;
const SNDCTL_DSP_GETISPACE: u8 = 13;
const SNDCTL_DSP_GETCAPS: u8 = 15;
const SNDCTL_DSP_GETIPTR: u8 = 17;
const SNDCTL_DSP_GETOPTR: u8 = 18;
const SNDCTL_DSP_SYNCGROUP: u8 = 28;
const SNDCTL_DSP_SYNCSTART: u8 = 29;
const SNDCTL_DSP_COOKEDMODE: u8 = 30;
const SNDCTL_DSP_CURRENT_IPTR: u8 = 35;
const SNDCTL_DSP_CURRENT_OPTR: u8 = 36;

nix::ioctl_readwrite!(oss_set_speed, SNDCTL_DSP_MAGIC, SNDCTL_DSP_SPEED, i32);
nix::ioctl_readwrite!(oss_set_format, SNDCTL_DSP_MAGIC, SNDCTL_DSP_SETFMT, u32);
nix::ioctl_readwrite!(oss_set_channels, SNDCTL_DSP_MAGIC, SNDCTL_DSP_CHANNELS, i32);
nix::ioctl_readwrite!(
    oss_set_fragment,
    SNDCTL_DSP_MAGIC,
    SNDCTL_DSP_SETFRAGMENT,
    i32
);
nix::ioctl_read!(
    oss_output_buffer_info,
    SNDCTL_DSP_MAGIC,
    SNDCTL_DSP_GETOSPACE,
    BufferInfo
);
nix::ioctl_read!(
    oss_input_buffer_info,
    SNDCTL_DSP_MAGIC,
    SNDCTL_DSP_GETISPACE,
    BufferInfo
);
nix::ioctl_read!(oss_get_caps, SNDCTL_DSP_MAGIC, SNDCTL_DSP_GETCAPS, i32);
nix::ioctl_read!(
    oss_get_iptr,
    SNDCTL_DSP_MAGIC,
    SNDCTL_DSP_GETIPTR,
    CountInfo
);
nix::ioctl_read!(
    oss_get_optr,
    SNDCTL_DSP_MAGIC,
    SNDCTL_DSP_GETOPTR,
    CountInfo
);
nix::ioctl_readwrite!(
    oss_add_sync_group,
    SNDCTL_DSP_MAGIC,
    SNDCTL_DSP_SYNCGROUP,
    OssSyncGroup
);
nix::ioctl_write_ptr!(oss_start_group, SNDCTL_DSP_MAGIC, SNDCTL_DSP_SYNCSTART, i32);
nix::ioctl_write_ptr!(oss_set_cooked, SNDCTL_DSP_MAGIC, SNDCTL_DSP_COOKEDMODE, i32);
nix::ioctl_read!(
    oss_current_iptr,
    SNDCTL_DSP_MAGIC,
    SNDCTL_DSP_CURRENT_IPTR,
    OssCount
);
nix::ioctl_read!(
    oss_current_optr,
    SNDCTL_DSP_MAGIC,
    SNDCTL_DSP_CURRENT_OPTR,
    OssCount
);

pub fn add_to_sync_group(fd: i32, group: i32, input: bool) -> bool {
    let mut sync_group = OssSyncGroup {
        id: group,
        mode: if input {
            PCM_ENABLE_INPUT
        } else {
            PCM_ENABLE_OUTPUT
        },
        filler: [0; 16],
    };
    unsafe { oss_add_sync_group(fd, &mut sync_group) }.is_ok()
}

pub fn start_sync_group(fd: i32, group: i32) -> bool {
    unsafe { oss_start_group(fd, &group) }.is_ok()
}
