//! Charge Map Library - Clustering Engine for EV Charging Sites
//!
//! This library turns a collection of geotagged charging sites into the set of map
//! annotations visible for a given viewport and zoom level. Nearby sites are merged into
//! clusters whose charger availability is the sum of their members, and clusters split
//! apart as the user zooms in.
//!
//! # Architecture
//!
//! - **[`aggregate()`] / [`level_summary()`]**: Per-site charger summaries
//! - **[`Site`] / [`SiteCollection`]**: Validated, immutable site records and versioned snapshots
//! - **[`ClusterIndex`]**: Hierarchical per-zoom cluster index backed by point quadtrees
//! - **[`SpatialNode`]**: Query result, either a single site leaf or a merged cluster
//! - **[`ClusterController`]**: Owns the index lifecycle and reconciles viewport changes
//! - **[`CollectionSummary`]**: Charger and station totals for a set of sites
//!
//! # Performance Characteristics
//!
//! - **Build Time**: O(Z × N log N) for Z zoom levels and N sites
//! - **Query Time**: O(log N + K) where K=results
//! - **Memory**: O(Z × N) for the per-zoom levels

mod aggregate;
mod controller;
#[cfg(feature = "serde")]
pub mod geojson;
mod index;
mod node;
mod quadtree;
mod query;
mod site;
mod summary;
pub mod utils;

// Public API exports
pub use aggregate::{SiteAggregate, aggregate, level_summary};
pub use controller::{ClusterController, Config, ControllerState, ControllerStats};
pub use index::{ClusterIndex, ClusterOptions};
pub use node::{Bound, CameraTarget, ClusterNode, LeafNode, SpatialNode, Viewport};
pub use site::{Charger, Site, SiteCollection, Station};
pub use summary::{CollectionSummary, SummaryRow, SummarySection};

/// Error types for the clustering engine
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Invalid site {id}: {reason}")]
    InvalidSite { id: String, reason: String },

    #[error("No cluster with id {0}")]
    NotFound(u64),

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
