//! # kbconsole
//!
//! Native admin console for the knowledge-base backend: department
//! management, multi-department file search, and the client-side router
//! that gates every navigation on session and role.
//!
//! The `net` modules wrap the REST surface, `state` owns the browser-style
//! session (credential, identity, post-login redirect), `router` holds the
//! route tree and the navigation guard, and `devserver` serves a built
//! front-end while proxying API calls to the backend.

pub mod config;
pub mod devserver;
pub mod net;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;
