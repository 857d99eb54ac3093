//! # Shared Types Crate
//!
//! Chain entities and storage errors shared by the block generator, its
//! adapters and the node runtime.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: block headers, producer records and queue
//!   items are defined once here.
//! - **Opaque Envelopes**: transactions travel as raw bytes; only the
//!   transaction collaborator parses them.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
