//! Caller identity.
//!
//! `resolver.rs` decides who is calling; `user.rs` shapes the answer for
//! `/api/user`. "Not connected" is a normal state, not an error response.

pub mod resolver;
pub mod user;

pub use resolver::{Identity, IdentityError, IdentityResolver, USER_LOGIN_HEADER, USER_NAME_HEADER};
pub use user::UserInfo;
