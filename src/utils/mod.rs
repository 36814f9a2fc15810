pub mod graceful_shutdown;
pub mod http_headers;

pub use graceful_shutdown::{GracefulShutdown, ShutdownReason};
