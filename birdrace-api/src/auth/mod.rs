//! Authentication: magic-link login and bearer access tokens

pub mod extractor;
pub mod magic_link;
pub mod token;

pub use extractor::AuthUser;
pub use token::{Claims, TokenError, TokenSigner};
