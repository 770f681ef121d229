//! Domain types and filesystem primitives for the face-swap job pipeline.
//!
//! Everything here is independent of the HTTP layer and of the external
//! engine: size-bounded upload persistence, the asset sandbox, and the
//! per-owner storage layout.

pub mod error;
pub mod layout;
pub mod media;
pub mod owner;
pub mod sandbox;
pub mod types;
pub mod upload;
