//! Domain models for artist discovery
//!
//! - [`entity`]: canonical artist entities and name normalization
//! - [`relationship`]: persisted edges and their closed type vocabulary
//! - [`evidence`]: ephemeral facts produced by source adapters
//! - [`analysis`]: AI analysis payload
//! - [`request`]: discovery request/response wire types

pub mod analysis;
pub mod entity;
pub mod evidence;
pub mod relationship;
pub mod request;

pub use analysis::{ArtistAnalysis, Recommendation};
pub use entity::{name_key, normalize_name, slugify, CanonicalEntity, EntityId, EntityProfile};
pub use evidence::{Evidence, SourceKind};
pub use relationship::{ProvenanceEntry, RelationType, Relationship};
pub use request::{
    DiscoveryRequest, DiscoveryResponse, DiscoveryResults, DiscoveryType, EnhancementResult,
    ErrorLogEntry,
};
