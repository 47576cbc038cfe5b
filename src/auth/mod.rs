pub mod backend;
pub mod client;
pub mod credentials;
pub mod decoder;
pub mod error;
pub mod refresh;

pub use backend::{HttpIdentityBackend, IdentityBackend};
pub use client::{ApiRequest, ApiResponse, AuthenticatedClient};
pub use credentials::CredentialExchange;
pub use error::AuthError;
pub use refresh::RefreshCoordinator;
