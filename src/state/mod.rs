//! Client-side state.
//!
//! DESIGN
//! ======
//! Only the session lives here today; router state belongs to
//! `router::navigator`.

pub mod session;
