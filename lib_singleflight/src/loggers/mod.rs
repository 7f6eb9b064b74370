/// tracing subscriber setup with optional file output.
pub mod tracing_setup;

pub use tracing_setup::{cleanup_old_logs, init_tracing};
