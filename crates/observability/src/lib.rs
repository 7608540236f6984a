//! Tracing/logging setup shared by binaries.

pub mod subscriber;

pub use subscriber::{LogFormat, UnknownLogFormat};

/// Initialize process-wide tracing.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(format: LogFormat) {
    subscriber::init(format);
}
