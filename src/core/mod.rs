pub mod error;
pub mod filter;
pub mod forwarding;
pub mod hijack;
pub mod identity;
pub mod retry;
pub mod rewriter;
pub mod uri;

pub use error::{GatewayError, GatewayResult};
pub use filter::{FilterRegistry, ResponseFilterEngine};
pub use forwarding::{ForwardContext, ForwardMode, ForwardingEngine};
pub use hijack::{HijackBridge, RelayEnd, RelaySummary};
pub use identity::{BackendTarget, CertificatePair, Identity};
pub use retry::RetryPolicy;
pub use rewriter::{RequestRewriter, RewriteError};
