//! External face-swap engine invocation.
//!
//! The engine (FaceFusion in `headless-run` mode) is an opaque collaborator.
//! This crate decides how to launch it ([`strategy`]), what environment it
//! gets ([`environment`]), supervises the child process ([`subprocess`]) and
//! turns the outcome into an [`Artifact`](faceswap_core::types::Artifact) or a
//! typed [`EngineError`](error::EngineError).

pub mod environment;
pub mod error;
pub mod invoker;
pub mod strategy;
pub mod subprocess;

pub use environment::{EngineEnvironment, EngineSettings};
pub use error::EngineError;
pub use invoker::{EngineInvoker, FaceFusionInvoker};
pub use strategy::{EngineConfig, EngineLaunchStrategy};
