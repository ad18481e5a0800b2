use cluster_common::{DVec2, Rect};
use cluster_kernel::{Entity, EntityKind};
use cluster_persist::{EntityStore, StoreError};
use serde::{Deserialize, Serialize};

use crate::clip::{Edge, clip_edge};
use crate::voronoi::compute_cells;

/// Partitioner tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Distance beyond the viewport within which planets still count as
    /// sites, so cells near the border are shaped by their neighbours.
    pub site_margin: f64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            site_margin: 9_000.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("viewport size {0:?} must be finite and non-negative")]
    InvalidViewport(DVec2),
}

/// A planet taking part in the partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub key: String,
    pub owner: Option<String>,
    pub position: DVec2,
}

/// Visible part of one planet's cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub site: String,
    pub owner: Option<String>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Default)]
pub struct ViewportPartitioner {
    config: PartitionConfig,
}

impl ViewportPartitioner {
    /// A partitioner using `config` for its range queries.
    pub fn new(config: PartitionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Territory polygons of the planets around the viewport, clipped to it.
    pub fn partition(
        &self,
        store: &EntityStore,
        center: DVec2,
        size: DVec2,
    ) -> Result<Vec<Polygon>, PartitionError> {
        if !size.is_finite() || size.min_element() < 0.0 || !center.is_finite() {
            return Err(PartitionError::InvalidViewport(size));
        }
        let _span = tracing::info_span!("viewport_partition", x = center.x, y = center.y).entered();
        let viewport = Rect::from_center_size(center, size);
        let sites: Vec<Site> = store
            .find_in_rect(EntityKind::Planet, viewport.expand(self.config.site_margin))?
            .into_iter()
            .filter_map(|entity| match entity {
                Entity::Planet(planet) => Some(Site {
                    key: planet.key(),
                    position: planet.world_position(),
                    owner: planet.owner,
                }),
                _ => None,
            })
            .collect();
        let polygons = self.partition_sites(&sites, viewport);
        tracing::debug!(sites = sites.len(), polygons = polygons.len(), "partitioned viewport");
        Ok(polygons)
    }

    /// Partition known sites. Cells with no visible edge are left out.
    pub fn partition_sites(&self, sites: &[Site], viewport: Rect) -> Vec<Polygon> {
        let positions: Vec<DVec2> = sites.iter().map(|s| s.position).collect();
        let bounds = Rect::bounding(positions.iter().copied())
            .map_or(viewport, |b| b.union(&viewport))
            .expand(self.config.site_margin.max(1.0));

        compute_cells(&positions, bounds)
            .into_iter()
            .zip(sites)
            .filter_map(|(cell, site)| {
                let edges: Vec<Edge> = (0..cell.len())
                    .filter_map(|ix| {
                        let edge = Edge::new(cell[ix], cell[(ix + 1) % cell.len()]);
                        clip_edge(edge, viewport)
                    })
                    .collect();
                (!edges.is_empty()).then(|| Polygon {
                    site: site.key.clone(),
                    owner: site.owner.clone(),
                    edges,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_common::I64Vec2;
    use cluster_kernel::Planet;
    use cluster_persist::MemoryBackend;

    fn site(x: f64, y: f64, owner: Option<&str>) -> Site {
        Site {
            key: format!("planet.{x}_{y}"),
            owner: owner.map(String::from),
            position: DVec2::new(x, y),
        }
    }

    #[test]
    fn edges_stay_inside_viewport() {
        let partitioner = ViewportPartitioner::default();
        let viewport = Rect::from_center_size(DVec2::ZERO, DVec2::new(1000.0, 600.0));
        let sites = [
            site(-300.0, 0.0, Some("alice")),
            site(300.0, 100.0, Some("bob")),
            site(0.0, -250.0, None),
            site(5000.0, 5000.0, None),
        ];
        let polygons = partitioner.partition_sites(&sites, viewport);
        assert_eq!(polygons.len(), 3);
        for polygon in &polygons {
            for edge in &polygon.edges {
                assert!(viewport.contains(edge.start) && viewport.contains(edge.end));
            }
        }
        assert_eq!(polygons[0].owner.as_deref(), Some("alice"));
        assert_eq!(polygons[2].owner, None);
    }

    #[test]
    fn cell_border_outside_viewport_is_left_out() {
        let partitioner = ViewportPartitioner::default();
        let viewport = Rect::from_center_size(DVec2::ZERO, DVec2::new(10.0, 10.0));
        // a lone cell is the whole bounding box, whose edges all lie outside
        assert!(partitioner.partition_sites(&[site(1.0, 1.0, None)], viewport).is_empty());
    }

    #[test]
    fn no_sites_no_polygons() {
        let partitioner = ViewportPartitioner::default();
        let viewport = Rect::from_center_size(DVec2::ZERO, DVec2::ONE);
        assert!(partitioner.partition_sites(&[], viewport).is_empty());
    }

    #[test]
    fn partition_reads_planets_near_viewport() {
        let store = EntityStore::open(MemoryBackend::new());
        let planets = [
            ((-400, 0), "alice"),
            ((400, 0), "bob"),
            ((0, 600), "dave"),
            ((100_000, 0), "carol"),
        ];
        for ((x, y), owner) in planets {
            let mut planet = Planet::new(I64Vec2::new(x, y), 1, 0, 10, 0);
            planet.owner = Some(owner.into());
            store.save(&planet.into()).unwrap();
        }
        let partitioner = ViewportPartitioner::new(PartitionConfig { site_margin: 1_000.0 });
        let polygons = partitioner
            .partition(&store, DVec2::ZERO, DVec2::new(2000.0, 2000.0))
            .unwrap();
        assert_eq!(polygons.len(), 3);
        assert!(polygons.iter().all(|p| p.owner.as_deref() != Some("carol")));

        // the alice/bob border runs down x = 0 from the common vertex and is
        // cut at the bottom of the viewport
        let alice = polygons
            .iter()
            .find(|p| p.owner.as_deref() == Some("alice"))
            .unwrap();
        let border = alice
            .edges
            .iter()
            .find(|e| e.start.x == 0.0 && e.end.x == 0.0)
            .unwrap();
        let low = border.start.y.min(border.end.y);
        assert_eq!(low, -1000.0);
    }

    #[test]
    fn invalid_viewport_is_rejected() {
        let store = EntityStore::open(MemoryBackend::new());
        let err = ViewportPartitioner::default()
            .partition(&store, DVec2::ZERO, DVec2::new(-1.0, 5.0))
            .unwrap_err();
        assert!(matches!(err, PartitionError::InvalidViewport(_)));
    }
}
