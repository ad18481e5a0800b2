//! Territory partitioning: Voronoi cells of planets, clipped to a viewport.
//!
//! # Invariants
//! - Every returned edge has both ends inside the viewport (borders included).
//! - Parallel edge/side pairs are skipped, never divided by.

mod clip;
mod viewport;
mod voronoi;

pub use clip::{Edge, Side, boundary_crossing, clip_edge};
pub use viewport::{PartitionConfig, PartitionError, Polygon, Site, ViewportPartitioner};
pub use voronoi::compute_cells;
