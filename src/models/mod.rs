pub mod session;
pub mod token;
pub mod user;

pub use session::{ClientSession, Session};
pub use token::{RefreshedTokens, SessionError, TokenPair};
pub use user::UserIdentity;
