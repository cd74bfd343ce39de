//! Client-side routing.
//!
//! SYSTEM CONTEXT
//! ==============
//! `routes` resolves a location to a matched chain, `guard` decides whether
//! that navigation may proceed, and `navigator` ties the two together and
//! follows redirects until a location is accepted.

pub mod guard;
pub mod navigator;
pub mod routes;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("no route matches {0}")]
    NoMatch(String),

    #[error("navigation to {path} redirected {hops} times without settling")]
    RedirectLoop { path: String, hops: usize },
}
