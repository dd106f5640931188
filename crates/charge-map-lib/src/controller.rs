//! ClusterController - Owns the cluster index and reconciles viewport changes
//!
//! The controller is the entry point for a map screen: feed it site snapshots and
//! viewport events, read back the visible clusters. It rebuilds the index only when the
//! snapshot version changes and re-queries whenever a viewport is known.

use crate::{
    Bound, CameraTarget, ClusterIndex, ClusterOptions, Result, SiteCollection, SpatialNode,
    Viewport,
};
use instant::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the cluster controller
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Options used for every index build
    pub cluster: ClusterOptions,
    /// Added to a cluster's expansion zoom when zooming the camera onto it, so the
    /// cluster is guaranteed to have split once the camera arrives.
    /// Default: 0.7
    pub expansion_epsilon: f64,
    /// Re-run the current query when a site selection is dismissed.
    /// Default: false
    pub recluster_on_dismiss: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: ClusterOptions::default(),
            expansion_epsilon: 0.7,
            recluster_on_dismiss: false,
        }
    }
}

/// Lifecycle of the controller's index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ControllerState {
    /// No site data received yet
    Uninitialized,
    /// Index built, no viewport known
    Indexed,
    /// Index built and queried for the current viewport
    Queried,
}

/// Timing and size of the most recent build and query
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControllerStats {
    /// Number of index builds so far
    pub build_count: usize,
    /// Sites in the current index
    pub site_count: usize,
    /// Last build time in milliseconds
    pub last_build_time_ms: f64,
    /// Last query time in milliseconds
    pub last_query_time_ms: f64,
    /// Number of nodes returned by the last query
    pub last_query_nodes: usize,
}

/// Owns the cluster index lifecycle for one map
#[derive(Debug, Clone)]
pub struct ClusterController {
    config: Config,
    index: Option<ClusterIndex>,
    viewport: Option<Viewport>,
    clusters: Vec<SpatialNode>,
    stats: ControllerStats,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ClusterController {
    /// Create a controller without any site data
    pub fn new(config: Config) -> Self {
        Self {
            config,
            index: None,
            viewport: None,
            clusters: Vec::new(),
            stats: ControllerStats::default(),
        }
    }

    /// Deliver a site snapshot
    ///
    /// Rebuilds the index unless the snapshot has the same version as the indexed one,
    /// then re-queries if a viewport is known. Returns whether a rebuild happened.
    pub fn sites_changed(&mut self, sites: &SiteCollection) -> bool {
        if self
            .index
            .as_ref()
            .is_some_and(|index| index.version() == sites.version())
        {
            tracing::trace!("Site collection version {} already indexed", sites.version());
            return false;
        }

        self.build(sites);
        self.refresh();
        true
    }

    /// Deliver a viewport change and return the clusters visible in it
    ///
    /// Before any site data arrives the viewport is remembered and the result is empty.
    pub fn viewport_changed(&mut self, viewport: Viewport) -> &[SpatialNode] {
        self.viewport = Some(viewport);
        self.refresh();
        &self.clusters
    }

    /// Rebuild the index from the current snapshot, e.g. after changing options
    ///
    /// Does nothing before the first snapshot arrives.
    pub fn rebuild(&mut self) {
        let Some(sites) = self.index.as_ref().map(|index| index.sites().clone()) else {
            return;
        };
        self.build(&sites);
        self.refresh();
    }

    /// Query the current index without changing the remembered viewport
    ///
    /// Returns an empty list before the first snapshot arrives.
    pub fn query_clusters(&self, bound: Bound, zoom: f64) -> Vec<SpatialNode> {
        match &self.index {
            Some(index) => index.query(bound, zoom),
            None => Vec::new(),
        }
    }

    /// Where to move the camera to see a cluster split apart
    ///
    /// # Errors
    /// [`crate::ClusterError::NotFound`] if the id does not belong to the current index.
    pub fn expansion_target(&self, cluster_id: u64) -> Result<CameraTarget> {
        let index = self
            .index
            .as_ref()
            .ok_or(crate::ClusterError::NotFound(cluster_id))?;

        let cluster = index.cluster(cluster_id)?;
        let zoom = index.expansion_zoom(cluster_id)?;

        Ok(CameraTarget {
            center: cluster.centroid,
            zoom: f64::from(zoom) + self.config.expansion_epsilon,
        })
    }

    /// Dismiss the current site selection
    ///
    /// Selection itself is UI state; this only re-queries when configured to.
    /// Returns whether the clusters were refreshed.
    pub fn dismiss_selection(&mut self) -> bool {
        if !self.config.recluster_on_dismiss || self.index.is_none() {
            return false;
        }
        self.refresh();
        true
    }

    /// Replace the configuration and rebuild with it
    pub fn set_config(&mut self, config: Config) {
        let options_changed = config.cluster != self.config.cluster;
        self.config = config;
        if options_changed {
            self.rebuild();
        }
    }

    /// Clusters for the last known viewport
    #[inline]
    pub fn clusters(&self) -> &[SpatialNode] {
        &self.clusters
    }

    #[inline]
    pub fn state(&self) -> ControllerState {
        match (&self.index, &self.viewport) {
            (None, _) => ControllerState::Uninitialized,
            (Some(_), None) => ControllerState::Indexed,
            (Some(_), Some(_)) => ControllerState::Queried,
        }
    }

    #[inline]
    pub fn index(&self) -> Option<&ClusterIndex> {
        self.index.as_ref()
    }

    #[inline]
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    fn build(&mut self, sites: &SiteCollection) {
        let start = Instant::now();
        let index = ClusterIndex::build(sites, self.config.cluster.clone());

        self.stats.build_count += 1;
        self.stats.site_count = sites.len();
        self.stats.last_build_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            "Indexed {} sites (version {}) in {:.2}ms",
            sites.len(),
            sites.version(),
            self.stats.last_build_time_ms
        );

        // Swap in the new index only once it is complete
        self.index = Some(index);
    }

    /// Re-run the query for the remembered viewport, if any
    fn refresh(&mut self) {
        let (Some(index), Some(viewport)) = (&self.index, self.viewport) else {
            return;
        };

        let start = Instant::now();
        self.clusters = index.query(viewport.bound, viewport.zoom);

        self.stats.last_query_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.stats.last_query_nodes = self.clusters.len();
        tracing::debug!(
            "Queried {} nodes at zoom {:.2} in {:.2}ms",
            self.clusters.len(),
            viewport.zoom,
            self.stats.last_query_time_ms
        );
    }
}

impl Default for ClusterController {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Charger, ClusterError, Site, SiteAggregate};
    use geo::Point;

    fn site(id: &str, lng: f64, lat: f64, available: u32, total: u32) -> Site {
        Site::new(
            id,
            id,
            Point::new(lng, lat),
            vec![Charger {
                available,
                total,
                level: "L2".to_string(),
            }],
        )
        .unwrap()
    }

    fn create_test_sites() -> SiteCollection {
        SiteCollection::new(vec![
            site("A", -122.41, 37.77, 2, 4),
            site("B", -122.42, 37.78, 1, 2),
        ])
    }

    fn world(zoom: f64) -> Viewport {
        Viewport::new(Bound::world(), zoom)
    }

    #[test]
    fn test_controller_creation() {
        let controller = ClusterController::new(Config::default());
        assert_eq!(controller.state(), ControllerState::Uninitialized);
        assert!(controller.clusters().is_empty());
        assert!(controller.index().is_none());
        assert_eq!(controller.config().expansion_epsilon, 0.7);
        assert!(!controller.config().recluster_on_dismiss);
    }

    #[test]
    fn test_sites_then_viewport() {
        let mut controller = ClusterController::default();
        assert!(controller.sites_changed(&create_test_sites()));
        assert_eq!(controller.state(), ControllerState::Indexed);
        assert!(controller.clusters().is_empty());

        let clusters = controller.viewport_changed(world(0.0));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].aggregate(), SiteAggregate::new(3, 6));
        assert_eq!(controller.state(), ControllerState::Queried);
    }

    #[test]
    fn test_viewport_before_sites_is_remembered() {
        let mut controller = ClusterController::default();
        assert!(controller.viewport_changed(world(14.0)).is_empty());
        assert_eq!(controller.state(), ControllerState::Uninitialized);

        controller.sites_changed(&create_test_sites());
        assert_eq!(controller.state(), ControllerState::Queried);
        assert_eq!(controller.clusters().len(), 2);
    }

    #[test]
    fn test_same_version_is_noop() {
        let mut controller = ClusterController::default();
        let sites = create_test_sites();
        assert!(controller.sites_changed(&sites));
        assert!(!controller.sites_changed(&sites));
        assert!(!controller.sites_changed(&sites.clone()));
        assert_eq!(controller.stats().build_count, 1);
    }

    #[test]
    fn test_new_version_rebuilds_and_requeries() {
        let mut controller = ClusterController::default();
        controller.sites_changed(&create_test_sites());
        controller.viewport_changed(world(14.0));
        assert_eq!(controller.clusters().len(), 2);

        let more = SiteCollection::new(vec![
            site("A", -122.41, 37.77, 2, 4),
            site("B", -122.42, 37.78, 1, 2),
            site("C", 2.35, 48.85, 0, 1),
        ]);
        assert!(controller.sites_changed(&more));
        assert_eq!(controller.clusters().len(), 3);
        assert_eq!(controller.stats().build_count, 2);
        assert_eq!(controller.stats().site_count, 3);
        assert_eq!(controller.stats().last_query_nodes, 3);
    }

    #[test]
    fn test_query_before_index_is_empty() {
        let controller = ClusterController::default();
        assert!(controller.query_clusters(Bound::world(), 3.0).is_empty());
    }

    #[test]
    fn test_expansion_target() {
        let mut controller = ClusterController::default();
        controller.sites_changed(&create_test_sites());
        let cluster = controller.viewport_changed(world(0.0))[0]
            .as_cluster()
            .cloned()
            .unwrap();

        let target = controller.expansion_target(cluster.id).unwrap();
        let expansion_zoom = controller.index().unwrap().expansion_zoom(cluster.id).unwrap();
        assert!((target.zoom - (f64::from(expansion_zoom) + 0.7)).abs() < 1e-12);
        assert!((target.center.x() - cluster.centroid.x()).abs() < 1e-9);
        assert!((target.center.y() - cluster.centroid.y()).abs() < 1e-9);
    }

    #[test]
    fn test_expansion_target_unknown_id() {
        let mut controller = ClusterController::default();
        assert!(matches!(
            controller.expansion_target(5),
            Err(ClusterError::NotFound(5))
        ));

        controller.sites_changed(&create_test_sites());
        assert!(matches!(
            controller.expansion_target(1),
            Err(ClusterError::NotFound(1))
        ));
    }

    #[test]
    fn test_dismiss_selection() {
        let mut controller = ClusterController::default();
        controller.sites_changed(&create_test_sites());
        controller.viewport_changed(world(0.0));
        assert!(!controller.dismiss_selection());

        let mut controller = ClusterController::new(Config {
            recluster_on_dismiss: true,
            ..Config::default()
        });
        assert!(!controller.dismiss_selection());
        controller.sites_changed(&create_test_sites());
        controller.viewport_changed(world(0.0));
        assert!(controller.dismiss_selection());
        assert_eq!(controller.clusters().len(), 1);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut controller = ClusterController::default();
        controller.sites_changed(&create_test_sites());
        let before: Vec<String> = controller
            .viewport_changed(world(5.0))
            .iter()
            .map(SpatialNode::key)
            .collect();

        controller.rebuild();
        let after: Vec<String> = controller.clusters().iter().map(SpatialNode::key).collect();
        assert_eq!(before, after);
        assert_eq!(controller.stats().build_count, 2);
    }

    #[test]
    fn test_set_config_rebuilds_on_option_change() {
        let mut controller = ClusterController::default();
        controller.sites_changed(&create_test_sites());
        controller.viewport_changed(world(0.0));
        assert_eq!(controller.clusters().len(), 1);

        controller.set_config(Config {
            cluster: ClusterOptions {
                min_points: 3,
                ..ClusterOptions::default()
            },
            ..Config::default()
        });
        assert_eq!(controller.clusters().len(), 2);
        assert_eq!(controller.stats().build_count, 2);

        controller.set_config(controller.config().clone());
        assert_eq!(controller.stats().build_count, 2);
    }
}
