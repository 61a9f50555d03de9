//! Synchronous full-duplex audio I/O against an OSS device.
//!
//! One control thread advances a recording and a playback channel through
//! period-sized buffers, phase-locked to a monotonic frame clock. Timing
//! jitter and sample-rate drift are absorbed by shifting upcoming buffer
//! deadlines; scheduler stalls beyond a period abandon the schedule and
//! re-anchor both channels.

pub mod buffer;
pub mod channel;
pub mod clock;
pub mod correction;
pub mod double_buffer;
pub mod error;
pub mod oss;
pub mod run;

pub use buffer::Buffer;
pub use channel::Channel;
pub use clock::{Clock, FrameClock};
pub use correction::Correction;
pub use double_buffer::DoubleBuffer;
pub use error::{Error, Result};
pub use run::{DuplexLoop, RunOptions};
