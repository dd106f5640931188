//! Hierarchical cluster index
//!
//! The index keeps one level per integer zoom between `min_zoom` and `max_zoom`, plus
//! a leaf level at `max_zoom + 1` holding every site. Levels are built top-down from
//! the leaves: at each zoom, points closer than `radius / (extent * 2^zoom)` in unit
//! Mercator space are greedily merged into a cluster whose centroid is the weighted
//! mean of its members and whose aggregate is their sum.
//!
//! The index is immutable once built. When the site collection changes, build a new
//! one; there is no incremental update.

use crate::quadtree::Quadtree;
use crate::{SiteAggregate, SiteCollection, utils};
use geo::Coord;
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Highest zoom supported by the cluster id encoding (origin zoom is stored in 5 bits)
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

/// Zoom marker for points not yet visited at any zoom
const UNPROCESSED: u8 = u8::MAX;

/// Configuration for building a [`ClusterIndex`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClusterOptions {
    /// Lowest zoom level that gets its own cluster level.
    /// Default: 0
    pub min_zoom: u8,
    /// Highest zoom level at which sites are still clustered.
    /// Queries above this zoom return individual sites.
    /// Default: 14
    pub max_zoom: u8,
    /// Minimum number of sites required to form a cluster.
    /// Default: 2
    pub min_points: u32,
    /// Cluster radius in pixels, relative to `extent`.
    /// Default: 40
    pub radius: f64,
    /// Tile extent in pixels the radius is measured against.
    /// Default: 512
    pub extent: f64,
    /// Number of points a quadtree node holds before it is subdivided.
    /// Default: 64
    pub node_capacity: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 14,
            min_points: 2,
            radius: 40.0,
            extent: 512.0,
            node_capacity: 64,
        }
    }
}

impl ClusterOptions {
    /// Clamp zoom bounds into the range the index can represent
    fn normalized(mut self) -> Self {
        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            tracing::warn!(
                "max_zoom {} exceeds supported maximum {}, clamping",
                self.max_zoom,
                MAX_SUPPORTED_ZOOM
            );
            self.max_zoom = MAX_SUPPORTED_ZOOM;
        }
        if self.min_zoom > self.max_zoom {
            tracing::warn!(
                "min_zoom {} exceeds max_zoom {}, clamping",
                self.min_zoom,
                self.max_zoom
            );
            self.min_zoom = self.max_zoom;
        }
        self.min_points = self.min_points.max(1);
        self
    }

    /// Search radius in unit Mercator space at the given zoom
    #[inline]
    pub(crate) fn radius_at(&self, zoom: u8) -> f64 {
        self.radius / (self.extent * 2f64.powi(i32::from(zoom)))
    }
}

/// What an indexed point stands for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PointSource {
    /// Index into the site collection
    Site(u32),
    /// Cluster id
    Cluster(u64),
}

/// A point stored in one zoom level
#[derive(Clone, Debug)]
pub(crate) struct IndexedPoint {
    /// Unit Mercator position
    pub(crate) coord: Coord<f64>,
    /// Last zoom at which this point was visited while clustering
    pub(crate) zoom: u8,
    /// Cluster this point was merged into one zoom level up
    pub(crate) parent_id: Option<u64>,
    pub(crate) num_points: u32,
    pub(crate) aggregate: SiteAggregate,
    pub(crate) source: PointSource,
}

impl IndexedPoint {
    fn cluster(coord: Coord<f64>, id: u64, num_points: u32, aggregate: SiteAggregate) -> Self {
        Self {
            coord,
            zoom: UNPROCESSED,
            parent_id: None,
            num_points,
            aggregate,
            source: PointSource::Cluster(id),
        }
    }

    /// Copy carried unchanged into the next (coarser) level
    fn carried(&self) -> Self {
        Self {
            zoom: UNPROCESSED,
            parent_id: None,
            ..self.clone()
        }
    }
}

/// All points of one zoom level plus their spatial index
#[derive(Debug, Clone)]
pub(crate) struct ZoomLevel {
    pub(crate) points: Vec<IndexedPoint>,
    pub(crate) tree: Quadtree,
}

impl ZoomLevel {
    fn new(points: Vec<IndexedPoint>, node_capacity: usize) -> Self {
        let tree = Quadtree::build(points.iter().map(|p| p.coord), node_capacity);
        Self { points, tree }
    }
}

/// Immutable, zoom-aware cluster index over a [`SiteCollection`]
#[derive(Debug, Clone)]
pub struct ClusterIndex {
    pub(crate) options: ClusterOptions,
    pub(crate) sites: SiteCollection,
    /// Levels from `min_zoom` (index 0) to `max_zoom + 1` (the leaves)
    pub(crate) levels: Vec<ZoomLevel>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ClusterIndex {
    /// Build an index over all sites of the collection
    ///
    /// Sites must have finite coordinates, which [`crate::Site::new`] guarantees.
    pub fn build(sites: &SiteCollection, options: ClusterOptions) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::build");

        let options = options.normalized();
        let num_sites = sites.len() as u64;

        // Project sites and compute their aggregates in parallel
        let leaves: Vec<IndexedPoint> = sites
            .sites()
            .par_iter()
            .enumerate()
            .map(|(i, site)| {
                let location = site.location();
                IndexedPoint {
                    coord: Coord {
                        x: utils::lng_x(location.x()),
                        y: utils::lat_y(location.y()),
                    },
                    zoom: UNPROCESSED,
                    parent_id: None,
                    num_points: 1,
                    aggregate: site.aggregate(),
                    source: PointSource::Site(i as u32),
                }
            })
            .collect();

        let mut levels = Vec::with_capacity(usize::from(options.max_zoom - options.min_zoom) + 2);
        let mut current = ZoomLevel::new(leaves, options.node_capacity);

        // Cluster each level from the finer one, starting at the leaves
        for zoom in (options.min_zoom..=options.max_zoom).rev() {
            let clustered = cluster_level(&mut current, zoom, &options, num_sites);
            let coarser = ZoomLevel::new(clustered, options.node_capacity);
            levels.push(std::mem::replace(&mut current, coarser));
        }
        levels.push(current);
        levels.reverse();

        tracing::debug!(
            "Built cluster index over {} sites: {} levels, {} nodes (zoom {}..={})",
            sites.len(),
            levels.len(),
            levels.iter().map(|level| level.tree.len()).sum::<usize>(),
            options.min_zoom,
            options.max_zoom
        );

        Self {
            options,
            sites: sites.clone(),
            levels,
        }
    }

    #[inline]
    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// The site collection this index was built from
    #[inline]
    pub fn sites(&self) -> &SiteCollection {
        &self.sites
    }

    /// Version of the site collection this index was built from
    #[inline]
    pub fn version(&self) -> u64 {
        self.sites.version()
    }

    /// Number of nodes (clusters and single sites) at an integer zoom
    pub fn node_count(&self, zoom: f64) -> usize {
        self.level(self.limit_zoom(zoom))
            .map(|level| level.points.len())
            .unwrap_or(0)
    }

    /// Floor a zoom and clamp it into `[min_zoom, max_zoom + 1]`
    pub(crate) fn limit_zoom(&self, zoom: f64) -> u8 {
        let floored = zoom.floor() as i64;
        floored.clamp(
            i64::from(self.options.min_zoom),
            i64::from(self.options.max_zoom) + 1,
        ) as u8
    }

    pub(crate) fn level(&self, zoom: u8) -> Option<&ZoomLevel> {
        let offset = zoom.checked_sub(self.options.min_zoom)?;
        self.levels.get(usize::from(offset))
    }

    /// Encode a cluster id from the origin point index and the zoom it was formed at
    #[inline]
    pub(crate) fn cluster_id(origin_index: usize, zoom: u8, num_sites: u64) -> u64 {
        ((origin_index as u64) << 5) + u64::from(zoom) + 1 + num_sites
    }

    /// Decode `(origin point index, origin level zoom)` from a cluster id
    #[inline]
    pub(crate) fn decode_cluster_id(&self, cluster_id: u64) -> Option<(usize, u8)> {
        let offset = cluster_id.checked_sub(self.sites.len() as u64)?;
        let origin_zoom = (offset % 32) as u8;
        // Clusters are formed at min_zoom..=max_zoom, one level above their origin
        if origin_zoom <= self.options.min_zoom || origin_zoom > self.options.max_zoom + 1 {
            return None;
        }
        let origin_index = usize::try_from(offset >> 5).ok()?;
        Some((origin_index, origin_zoom))
    }
}

/// Merge the points of `source` at `zoom`, returning the points of the coarser level
///
/// Marks every visited source point with `zoom` and records parent ids on points that
/// were merged, so children can later be recovered from the source level.
fn cluster_level(
    source: &mut ZoomLevel,
    zoom: u8,
    options: &ClusterOptions,
    num_sites: u64,
) -> Vec<IndexedPoint> {
    let radius = options.radius_at(zoom);
    let ZoomLevel { points, tree } = source;

    let mut next = Vec::new();
    let mut neighbors = Vec::new();

    for i in 0..points.len() {
        // Already merged into a cluster at this zoom
        if points[i].zoom <= zoom {
            continue;
        }
        points[i].zoom = zoom;

        let origin = points[i].coord;
        neighbors.clear();
        tree.within(origin, radius, &mut neighbors);

        let origin_count = points[i].num_points;
        let num_points: u32 = origin_count
            + neighbors
                .iter()
                .map(|&n| &points[n as usize])
                .filter(|b| b.zoom > zoom)
                .map(|b| b.num_points)
                .sum::<u32>();

        if num_points > origin_count && num_points >= options.min_points {
            let id = ClusterIndex::cluster_id(i, zoom, num_sites);
            let mut wx = origin.x * f64::from(origin_count);
            let mut wy = origin.y * f64::from(origin_count);
            let mut aggregate = points[i].aggregate;

            for &n in &neighbors {
                let b = &mut points[n as usize];
                if b.zoom <= zoom {
                    continue;
                }
                b.zoom = zoom;
                b.parent_id = Some(id);

                let weight = f64::from(b.num_points);
                wx += b.coord.x * weight;
                wy += b.coord.y * weight;
                aggregate += b.aggregate;
            }

            points[i].parent_id = Some(id);
            let total = f64::from(num_points);
            next.push(IndexedPoint::cluster(
                Coord {
                    x: wx / total,
                    y: wy / total,
                },
                id,
                num_points,
                aggregate,
            ));
        } else {
            next.push(points[i].carried());

            // Not enough points for a cluster; carry the neighbors over on their own
            if num_points > 1 {
                for &n in &neighbors {
                    let b = &mut points[n as usize];
                    if b.zoom <= zoom {
                        continue;
                    }
                    b.zoom = zoom;
                    next.push(b.carried());
                }
            }
        }
    }

    next
}
