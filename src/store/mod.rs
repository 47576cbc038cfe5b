pub mod base;
pub mod cookie_store;
pub mod no_store;

pub use base::{SessionPersistence, SessionStore, SessionView};
pub use cookie_store::{CookiePersistence, DecodedCookie, PendingCookie, SessionCookie};
pub use no_store::NoPersistence;
