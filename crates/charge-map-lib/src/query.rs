//! Cluster queries against a built [`ClusterIndex`]
//!
//! All lookups by cluster id decode the origin level and point from the id itself, then
//! search the origin level around that point for members carrying the cluster as parent.

use crate::index::{IndexedPoint, PointSource};
use crate::{
    Bound, ClusterError, ClusterIndex, ClusterNode, LeafNode, Result, SiteAggregate,
    SpatialNode, utils,
};
use geo::{Coord, Point};

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ClusterIndex {
    /// Nodes visible inside `bound` at `zoom`
    ///
    /// The zoom is floored and clamped into `[min_zoom, max_zoom + 1]`; at
    /// `max_zoom + 1` every site is returned on its own. Longitudes wrap around the
    /// antimeridian and latitudes are clamped, so any bound a map can produce is
    /// accepted. A bound with `south > north` is empty, matching [`Bound::contains`].
    /// Result order is unspecified.
    pub fn query(&self, bound: Bound, zoom: f64) -> Vec<SpatialNode> {
        #[cfg(feature = "profiling")]
        profiling::scope!("query::query");

        let south = bound.south.clamp(-90.0, 90.0);
        let north = bound.north.clamp(-90.0, 90.0);
        if south > north {
            return Vec::new();
        }

        let (west, east) = if bound.east - bound.west >= 360.0 {
            (-180.0, 180.0)
        } else {
            let west = utils::wrap_lng(bound.west);
            let east = if bound.east == 180.0 {
                180.0
            } else {
                utils::wrap_lng(bound.east)
            };

            if west > east {
                // Crosses the antimeridian: query both halves
                let mut nodes = self.query(Bound::new(west, south, 180.0, north), zoom);
                nodes.extend(self.query(Bound::new(-180.0, south, east, north), zoom));
                return nodes;
            }
            (west, east)
        };

        let zoom = self.limit_zoom(zoom);
        let Some(level) = self.level(zoom) else {
            return Vec::new();
        };

        // y grows southwards in unit space, so north gives the minimum
        let min = Coord {
            x: utils::lng_x(west),
            y: utils::lat_y(north),
        };
        let max = Coord {
            x: utils::lng_x(east),
            y: utils::lat_y(south),
        };

        let mut ids = Vec::new();
        level.tree.range(min, max, &mut ids);

        let nodes: Vec<SpatialNode> = ids
            .iter()
            .filter_map(|&i| self.node_for(&level.points[i as usize]))
            .collect();

        tracing::trace!(
            "Query at zoom {} returned {} nodes for {:?}",
            zoom,
            nodes.len(),
            bound
        );
        nodes
    }

    /// Smallest zoom at which the cluster splits into more than one node
    ///
    /// # Errors
    /// [`ClusterError::NotFound`] if `cluster_id` does not belong to this index.
    pub fn expansion_zoom(&self, cluster_id: u64) -> Result<u8> {
        let (_, origin_zoom) = self
            .decode_cluster_id(cluster_id)
            .ok_or(ClusterError::NotFound(cluster_id))?;

        let mut id = cluster_id;
        let mut zoom = origin_zoom.saturating_sub(1);
        while zoom <= self.options.max_zoom {
            let children = self.child_points(id)?;
            zoom += 1;

            if children.len() != 1 {
                break;
            }
            match children[0].source {
                PointSource::Cluster(child_id) => id = child_id,
                PointSource::Site(_) => break,
            }
        }
        Ok(zoom)
    }

    /// Nodes one zoom level below that were merged into the cluster
    ///
    /// # Errors
    /// [`ClusterError::NotFound`] if `cluster_id` does not belong to this index.
    pub fn children(&self, cluster_id: u64) -> Result<Vec<SpatialNode>> {
        Ok(self
            .child_points(cluster_id)?
            .into_iter()
            .filter_map(|point| self.node_for(point))
            .collect())
    }

    /// The cluster node for an id, as it appears in query results
    ///
    /// # Errors
    /// [`ClusterError::NotFound`] if `cluster_id` does not belong to this index.
    pub fn cluster(&self, cluster_id: u64) -> Result<ClusterNode> {
        let children = self.child_points(cluster_id)?;

        let mut point_count = 0u32;
        let mut aggregate = SiteAggregate::default();
        let (mut wx, mut wy) = (0.0, 0.0);
        for child in &children {
            let weight = f64::from(child.num_points);
            wx += child.coord.x * weight;
            wy += child.coord.y * weight;
            point_count += child.num_points;
            aggregate += child.aggregate;
        }

        let total = f64::from(point_count);
        Ok(ClusterNode {
            id: cluster_id,
            centroid: Point::new(utils::x_lng(wx / total), utils::y_lat(wy / total)),
            point_count,
            aggregate,
        })
    }

    /// Sites under the cluster, skipping `offset` and returning at most `limit`
    ///
    /// Pass `usize::MAX` as `limit` to get every site.
    ///
    /// # Errors
    /// [`ClusterError::NotFound`] if `cluster_id` does not belong to this index.
    pub fn leaves(&self, cluster_id: u64, limit: usize, offset: usize) -> Result<Vec<LeafNode>> {
        let mut leaves = Vec::new();
        self.append_leaves(&mut leaves, cluster_id, limit, offset, 0)?;
        Ok(leaves)
    }

    /// Depth-first leaf collection; returns the updated number of skipped leaves
    fn append_leaves(
        &self,
        result: &mut Vec<LeafNode>,
        cluster_id: u64,
        limit: usize,
        offset: usize,
        mut skipped: usize,
    ) -> Result<usize> {
        for child in self.child_points(cluster_id)? {
            if result.len() >= limit {
                break;
            }
            match child.source {
                PointSource::Cluster(child_id) => {
                    let count = child.num_points as usize;
                    if skipped + count <= offset {
                        // Skip the whole subtree
                        skipped += count;
                    } else {
                        skipped = self.append_leaves(result, child_id, limit, offset, skipped)?;
                    }
                }
                PointSource::Site(_) if skipped < offset => skipped += 1,
                PointSource::Site(index) => {
                    if let Some(site) = self.sites.get(index as usize) {
                        result.push(LeafNode {
                            site: site.clone(),
                            aggregate: child.aggregate,
                        });
                    }
                }
            }
        }
        Ok(skipped)
    }

    /// Points of the origin level whose parent is `cluster_id`
    fn child_points(&self, cluster_id: u64) -> Result<Vec<&IndexedPoint>> {
        let not_found = || ClusterError::NotFound(cluster_id);

        let (origin_index, origin_zoom) =
            self.decode_cluster_id(cluster_id).ok_or_else(not_found)?;
        let level = self.level(origin_zoom).ok_or_else(not_found)?;
        let origin = level.points.get(origin_index).ok_or_else(not_found)?;
        let radius = self
            .options
            .radius_at(origin_zoom.checked_sub(1).ok_or_else(not_found)?);

        let mut ids = Vec::new();
        level.tree.within(origin.coord, radius, &mut ids);

        let children: Vec<&IndexedPoint> = ids
            .iter()
            .map(|&i| &level.points[i as usize])
            .filter(|point| point.parent_id == Some(cluster_id))
            .collect();

        if children.is_empty() {
            return Err(not_found());
        }
        Ok(children)
    }

    /// Convert an indexed point into a public node
    fn node_for(&self, point: &IndexedPoint) -> Option<SpatialNode> {
        match point.source {
            PointSource::Site(index) => {
                let site = self.sites.get(index as usize)?;
                Some(SpatialNode::Leaf(LeafNode {
                    site: site.clone(),
                    aggregate: point.aggregate,
                }))
            }
            PointSource::Cluster(id) => Some(SpatialNode::Cluster(ClusterNode {
                id,
                centroid: Point::new(utils::x_lng(point.coord.x), utils::y_lat(point.coord.y)),
                point_count: point.num_points,
                aggregate: point.aggregate,
            })),
        }
    }
}
