//! # Pixel Source Collaborator
//!
//! Interface to the screen-capture pipeline consumed by capture-side peers.
//!
//! The broker itself never interprets image bytes; it relays or acknowledges
//! `screen_cap` messages. This trait exists so capture-side code can be
//! driven and tested without a real grab/encode pipeline. Rate limiting is
//! the caller's responsibility, not the source's.

use crate::protocol::Message;

/// One captured frame, already encoded (typically JPEG).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    /// Wrap this frame into a `screen_cap` message for a session.
    pub fn into_message(self, session_id: &str, compression: &str) -> Message {
        Message::screen_capture(session_id, &self.data, compression, self.width, self.height)
    }
}

/// Produces frames on demand. `None` means nothing could be captured right
/// now (display locked, source exhausted); callers decide whether to retry.
pub trait PixelSource: Send {
    fn capture_frame(&mut self) -> Option<CapturedFrame>;
}

/// A fixed sequence of frames, for tests and dry runs.
#[derive(Debug, Default)]
pub struct StaticSource {
    frames: Vec<CapturedFrame>,
}

impl StaticSource {
    pub fn new(frames: Vec<CapturedFrame>) -> Self {
        Self { frames }
    }
}

impl PixelSource for StaticSource {
    fn capture_frame(&mut self) -> Option<CapturedFrame> {
        if self.frames.is_empty() {
            None
        } else {
            Some(self.frames.remove(0))
        }
    }
}
