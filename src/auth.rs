//! Caller identifiers, credential pairs, and the cookie transport that carries them.

pub mod cookie;
pub mod credentials;
pub mod id;
pub mod secret;

pub use cookie::*;
pub use credentials::*;
pub use id::*;
pub use secret::*;
