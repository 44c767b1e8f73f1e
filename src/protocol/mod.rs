//! # Protocol Components
//!
//! Message model and frame codec: how raw bytes become typed messages and
//! back.
//!
//! ## Components
//! - **Message**: JSON envelope with per-kind builders
//! - **Codec**: Tokio codec for length-prefixed framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [Length(4, u32 big-endian)] [UTF-8 JSON message(Length)]
//! ```
//!
//! ## Security
//! - Maximum frame size enforced before allocation (default 1 MiB)
//! - Malformed frames are dropped (lenient) or fatal (strict), never stall
//!   the stream

pub mod codec;
pub mod message;

pub use codec::{FrameCodec, FrameEvent};
pub use message::Message;
