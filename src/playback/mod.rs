//! Audio playback.
//!
//! Two modes share the decoded-audio type but nothing else:
//! - [`PlaybackEngine`] owns one seekable buffer and a clock-driven timeline
//!   with play/pause, seek, skip, rate, volume and mute.
//! - [`QueuedPlayer`] plays independently decoded clips back to back, in the
//!   order they were enqueued.
//!
//! Both talk to the sound device through injected traits ([`AudioOutput`],
//! [`ClipSink`]) so they run headless in tests. Enable the `playback`
//! feature for rodio-backed implementations.

pub mod clock;
#[cfg(feature = "playback")]
pub mod device;
pub mod engine;
pub mod output;
pub mod queue;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use engine::{PlaybackEngine, PlaybackState, Progress};
pub use output::{AudioOutput, NullOutput};
pub use queue::{Clip, ClipSink, NullClipSink, QueueStatus, QueuedPlayer};
