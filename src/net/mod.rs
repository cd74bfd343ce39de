//! Networking modules for the knowledge-base REST surface.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` shapes and sends requests, `types` defines the wire schema and the
//! list-envelope normalization shared by every list endpoint.

pub mod api;
pub mod types;
