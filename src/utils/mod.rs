//! # Utility Modules
//!
//! Supporting utilities for logging and timekeeping.
//!
//! ## Components
//! - **Logging**: Structured logging configuration (tracing-subscriber)
//! - **Time**: Timestamp helpers for message envelopes and expiry checks

pub mod logging;
pub mod time;
