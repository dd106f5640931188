//! Query result and viewport types
//!
//! A query returns [`SpatialNode`]s, each either a single site or a cluster of sites.
//! Renderers should key them with [`SpatialNode::key`] when diffing between frames.

use crate::{Site, SiteAggregate, utils};
use geo::Point;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single, unclustered site
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LeafNode {
    pub site: Arc<Site>,
    pub aggregate: SiteAggregate,
}

/// Two or more sites merged at some zoom level
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ClusterNode {
    /// Cluster id, valid for the index that produced it
    pub id: u64,
    /// Point-count weighted centroid as (longitude, latitude)
    pub centroid: Point<f64>,
    /// Number of sites in the cluster
    pub point_count: u32,
    /// Sum of the member sites' aggregates
    pub aggregate: SiteAggregate,
}

/// A node visible at some zoom level
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "camelCase"))]
pub enum SpatialNode {
    Leaf(LeafNode),
    Cluster(ClusterNode),
}

impl SpatialNode {
    /// Stable key for diffing: `SITE-<siteId>` or `REGION-<clusterId>`
    pub fn key(&self) -> String {
        match self {
            Self::Leaf(leaf) => format!("SITE-{}", leaf.site.id()),
            Self::Cluster(cluster) => format!("REGION-{}", cluster.id),
        }
    }

    #[inline]
    pub fn aggregate(&self) -> SiteAggregate {
        match self {
            Self::Leaf(leaf) => leaf.aggregate,
            Self::Cluster(cluster) => cluster.aggregate,
        }
    }

    /// Number of sites represented (1 for leaves)
    #[inline]
    pub fn point_count(&self) -> u32 {
        match self {
            Self::Leaf(_) => 1,
            Self::Cluster(cluster) => cluster.point_count,
        }
    }

    /// Map position as (longitude, latitude)
    #[inline]
    pub fn position(&self) -> Point<f64> {
        match self {
            Self::Leaf(leaf) => leaf.site.location(),
            Self::Cluster(cluster) => cluster.centroid,
        }
    }

    #[inline]
    pub fn as_cluster(&self) -> Option<&ClusterNode> {
        match self {
            Self::Cluster(cluster) => Some(cluster),
            Self::Leaf(_) => None,
        }
    }

    #[inline]
    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            Self::Cluster(_) => None,
        }
    }

    #[inline]
    pub fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster(_))
    }
}

/// Visible rectangular region in degrees, `[west, south, east, north]`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bound {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bound {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// The whole world
    pub const fn world() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }

    /// Square bound of `half_size` degrees around a point
    pub fn around(center: Point<f64>, half_size: f64) -> Self {
        Self::new(
            center.x() - half_size,
            center.y() - half_size,
            center.x() + half_size,
            center.y() + half_size,
        )
    }

    /// Check if a (longitude, latitude) point lies inside, edges included
    ///
    /// Bounds crossing the antimeridian (west > east after wrapping) are handled.
    pub fn contains(&self, point: Point<f64>) -> bool {
        if point.y() < self.south || point.y() > self.north {
            return false;
        }
        if self.east - self.west >= 360.0 {
            return true;
        }
        let west = utils::wrap_lng(self.west);
        let east = if self.east == 180.0 {
            180.0
        } else {
            utils::wrap_lng(self.east)
        };
        let lng = point.x();
        if west <= east {
            lng >= west && lng <= east
        } else {
            lng >= west || lng <= east
        }
    }
}

/// A bound plus the map's (possibly fractional) zoom
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Viewport {
    pub bound: Bound,
    pub zoom: f64,
}

impl Viewport {
    pub const fn new(bound: Bound, zoom: f64) -> Self {
        Self { bound, zoom }
    }
}

/// Where to move the camera after tapping a cluster
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CameraTarget {
    /// (longitude, latitude)
    pub center: Point<f64>,
    pub zoom: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf() -> SpatialNode {
        let site = Site::new("A", "a", Point::new(-122.41, 37.77), Vec::new()).unwrap();
        SpatialNode::Leaf(LeafNode {
            site: Arc::new(site),
            aggregate: SiteAggregate::new(2, 4),
        })
    }

    fn cluster() -> SpatialNode {
        SpatialNode::Cluster(ClusterNode {
            id: 97,
            centroid: Point::new(-122.415, 37.775),
            point_count: 2,
            aggregate: SiteAggregate::new(3, 6),
        })
    }

    #[test]
    fn test_keys() {
        assert_eq!(leaf().key(), "SITE-A");
        assert_eq!(cluster().key(), "REGION-97");
    }

    #[test]
    fn test_accessors() {
        let leaf = leaf();
        assert_eq!(leaf.point_count(), 1);
        assert_eq!(leaf.aggregate(), SiteAggregate::new(2, 4));
        assert!(!leaf.is_cluster());
        assert!(leaf.as_leaf().is_some());
        assert_eq!(leaf.position(), Point::new(-122.41, 37.77));

        let cluster = cluster();
        assert_eq!(cluster.point_count(), 2);
        assert!(cluster.is_cluster());
        assert_eq!(cluster.as_cluster().map(|c| c.id), Some(97));
    }

    #[test]
    fn test_bound_contains() {
        let bound = Bound::new(-123.0, 37.0, -122.0, 38.0);
        assert!(bound.contains(Point::new(-122.41, 37.77)));
        assert!(bound.contains(Point::new(-123.0, 37.0)));
        assert!(!bound.contains(Point::new(-121.9, 37.5)));
        assert!(!bound.contains(Point::new(-122.5, 38.1)));

        assert!(Bound::world().contains(Point::new(180.0, 90.0)));
    }

    #[test]
    fn test_bound_contains_across_antimeridian() {
        let bound = Bound::new(170.0, -10.0, 190.0, 10.0);
        assert!(bound.contains(Point::new(175.0, 0.0)));
        assert!(bound.contains(Point::new(-175.0, 0.0)));
        assert!(!bound.contains(Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_bound_around() {
        let bound = Bound::around(Point::new(10.0, 20.0), 1.0);
        assert_eq!(bound, Bound::new(9.0, 19.0, 11.0, 21.0));
    }
}
