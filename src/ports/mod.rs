pub mod backend;
pub mod credentials;

pub use backend::{BackendConnector, BackendError, BackendResult};
pub use credentials::{CredentialError, CredentialProvider, CredentialResult};
