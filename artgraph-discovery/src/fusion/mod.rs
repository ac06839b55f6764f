//! Fusion layer
//!
//! [`EntityResolver`] turns names into canonical ids; [`RelationshipFuser`]
//! turns evidence between two ids into a relationship upsert, decoding the
//! source's vocabulary through [`vocabulary`].

pub mod fuser;
pub mod resolver;
pub mod vocabulary;

pub use fuser::{FuseOutcome, RelationshipFuser, SkipReason};
pub use resolver::{EntityResolver, Resolution, ResolveError};
