pub mod file_credentials;
pub mod kube_handler;
pub mod mtls_connector;

/// Re-export commonly used types from adapters
pub use file_credentials::FileCredentialProvider;
pub use kube_handler::{KubeHandler, router};
pub use mtls_connector::MtlsConnector;
