//! OSS device layer: dsp node configuration, memory-mapped rings, kernel
//! frame pointers and sync groups.

mod consts;
mod device;
mod io_util;
mod ioctl;
mod read;
mod write;

pub use self::consts::*;
pub use self::device::Dsp;
pub use self::read::OssReadChannel;
pub use self::write::OssWriteChannel;
