//! Authenticated access to the remote reader API.
//!
//! [`Remote`] owns the HTTP client, the endpoint paths and the wire
//! conventions (form-encoded requests, `output=json`, the 200..400 success
//! window). [`Authenticator`] carries the login token and the short-lived
//! edit token mutating endpoints require.

mod auth;
mod client;
mod types;

pub use auth::Authenticator;
pub use client::{Remote, RemoteError};
pub use types::{
    ContentBlock, IdStream, ItemRef, Link, Origin, RawCategory, RawItem, RawSubscription,
};
