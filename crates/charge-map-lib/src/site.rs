//! Site storage and validation module
//!
//! This module provides the `Site` record for a single charging location and
//! `SiteCollection`, a versioned snapshot of all sites fed to the cluster index.

use crate::{ClusterError, Result, SiteAggregate, aggregate, level_summary};
use geo::Point;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Charger availability for one charger level at a site
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Charger {
    pub available: u32,
    pub total: u32,
    pub level: String,
}

/// A single station at a site, only used for summaries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Station {
    pub id: String,
    pub name: String,
    pub status: String,
    pub meter_status: Vec<String>,
}

/// Represents a single charging site with validated location and chargers
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Site {
    id: String,
    name: String,
    /// WGS84 location, x = longitude, y = latitude
    location: Point<f64>,
    chargers: Vec<Charger>,
    stations: Vec<Station>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Site {
    /// Create a new Site
    ///
    /// # Errors
    /// Returns [`ClusterError::InvalidSite`] if the id is empty, the location is not a
    /// finite WGS84 coordinate, or a charger reports more available than total.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location: Point<f64>,
        chargers: Vec<Charger>,
    ) -> Result<Self> {
        let id = id.into();
        let invalid = |reason: String| ClusterError::InvalidSite {
            id: id.clone(),
            reason,
        };

        if id.is_empty() {
            return Err(invalid("empty id".to_string()));
        }

        let (lng, lat) = (location.x(), location.y());
        if !lng.is_finite() || !lat.is_finite() {
            return Err(invalid(format!("non-finite location ({lng}, {lat})")));
        }
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return Err(invalid(format!("location ({lng}, {lat}) out of range")));
        }

        if let Some(charger) = chargers.iter().find(|c| c.available > c.total) {
            return Err(invalid(format!(
                "{} charger has {} available of {} total",
                charger.level, charger.available, charger.total
            )));
        }

        Ok(Self {
            id,
            name: name.into(),
            location,
            chargers,
            stations: Vec::new(),
        })
    }

    /// Attach station records
    pub fn with_stations(mut self, stations: Vec<Station>) -> Self {
        self.stations = stations;
        self
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location as (longitude, latitude)
    #[inline]
    pub fn location(&self) -> Point<f64> {
        self.location
    }

    #[inline]
    pub fn chargers(&self) -> &[Charger] {
        &self.chargers
    }

    #[inline]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    #[inline]
    pub fn aggregate(&self) -> SiteAggregate {
        aggregate(&self.chargers)
    }

    #[inline]
    pub fn level_summary(&self) -> String {
        level_summary(&self.chargers)
    }
}

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// An immutable snapshot of all sites, tagged with a unique version
///
/// Clones share the version; every call to [`SiteCollection::new`] gets a fresh one.
/// The controller compares versions to decide whether the index must be rebuilt.
/// Site ids are unique within a collection.
#[derive(Clone, Debug)]
pub struct SiteCollection {
    version: u64,
    sites: Arc<[Arc<Site>]>,
}

impl SiteCollection {
    /// Create a snapshot, keeping the first site of each id
    ///
    /// Later sites with an already seen id are dropped with a warning.
    pub fn new(sites: Vec<Site>) -> Self {
        let mut seen = HashSet::with_capacity(sites.len());
        let sites: Arc<[Arc<Site>]> = sites
            .into_iter()
            .filter(|site| {
                let first = seen.insert(site.id().to_string());
                if !first {
                    tracing::warn!("Dropping site with duplicate id {}", site.id());
                }
                first
            })
            .map(Arc::new)
            .collect();

        Self {
            version: NEXT_VERSION.fetch_add(1, Ordering::Relaxed),
            sites,
        }
    }

    /// Create a snapshot, rejecting duplicate site ids
    ///
    /// # Errors
    /// Returns [`ClusterError::InvalidSite`] for the first id seen twice.
    pub fn try_new(sites: Vec<Site>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(sites.len());
        if let Some(duplicate) = sites.iter().find(|site| !seen.insert(site.id())) {
            return Err(ClusterError::InvalidSite {
                id: duplicate.id().to_string(),
                reason: "duplicate id".to_string(),
            });
        }
        Ok(Self::new(sites))
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn sites(&self) -> &[Arc<Site>] {
        &self.sites
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Arc<Site>> {
        self.sites.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Total aggregate over every site in the snapshot
    pub fn total_aggregate(&self) -> SiteAggregate {
        self.sites.iter().map(|site| site.aggregate()).sum()
    }
}

impl Default for SiteCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl From<Vec<Site>> for SiteCollection {
    fn from(sites: Vec<Site>) -> Self {
        Self::new(sites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_chargers() -> Vec<Charger> {
        vec![
            Charger {
                available: 2,
                total: 4,
                level: "L2".to_string(),
            },
            Charger {
                available: 1,
                total: 1,
                level: "L3".to_string(),
            },
        ]
    }

    #[test]
    fn test_site_creation() {
        let site = Site::new(
            "A",
            "Mission Bay",
            Point::new(-122.41, 37.77),
            create_test_chargers(),
        )
        .unwrap();

        assert_eq!(site.id(), "A");
        assert_eq!(site.name(), "Mission Bay");
        assert_eq!(site.chargers().len(), 2);
        assert!(site.stations().is_empty());
        assert_eq!(site.aggregate(), SiteAggregate::new(3, 5));
        assert_eq!(site.level_summary(), "L2+L3");
    }

    #[test]
    fn test_empty_id_fails() {
        let result = Site::new("", "x", Point::new(0.0, 0.0), Vec::new());
        assert!(matches!(result, Err(ClusterError::InvalidSite { .. })));
    }

    #[test]
    fn test_non_finite_location_fails() {
        let result = Site::new("A", "x", Point::new(f64::NAN, 0.0), Vec::new());
        assert!(result.is_err());

        let result = Site::new("A", "x", Point::new(0.0, f64::INFINITY), Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_location_fails() {
        assert!(Site::new("A", "x", Point::new(181.0, 0.0), Vec::new()).is_err());
        assert!(Site::new("A", "x", Point::new(0.0, -90.5), Vec::new()).is_err());
        assert!(Site::new("A", "x", Point::new(180.0, 90.0), Vec::new()).is_ok());
    }

    #[test]
    fn test_charger_over_capacity_fails() {
        let chargers = vec![Charger {
            available: 3,
            total: 2,
            level: "L2".to_string(),
        }];
        let result = Site::new("A", "x", Point::new(0.0, 0.0), chargers);
        assert!(matches!(result, Err(ClusterError::InvalidSite { id, .. }) if id == "A"));
    }

    #[test]
    fn test_site_without_chargers() {
        let site = Site::new("A", "x", Point::new(0.0, 0.0), Vec::new()).unwrap();
        assert_eq!(site.aggregate(), SiteAggregate::default());
        assert_eq!(site.level_summary(), "N/A");
    }

    #[test]
    fn test_collection_versions() {
        let first = SiteCollection::new(Vec::new());
        let second = SiteCollection::new(Vec::new());
        assert_ne!(first.version(), second.version());

        let clone = first.clone();
        assert_eq!(clone.version(), first.version());
    }

    #[test]
    fn test_collection_drops_duplicate_ids() {
        let first = Site::new("A", "first", Point::new(-122.41, 37.77), Vec::new()).unwrap();
        let second = Site::new("A", "second", Point::new(2.35, 48.85), Vec::new()).unwrap();
        let other = Site::new("B", "other", Point::new(0.0, 0.0), Vec::new()).unwrap();

        let collection = SiteCollection::new(vec![first, second, other]);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(0).unwrap().name(), "first");
        assert_eq!(collection.get(1).unwrap().id(), "B");
    }

    #[test]
    fn test_try_new_rejects_duplicate_ids() {
        let a = Site::new("A", "a", Point::new(0.0, 0.0), Vec::new()).unwrap();
        let b = Site::new("B", "b", Point::new(1.0, 1.0), Vec::new()).unwrap();

        let result = SiteCollection::try_new(vec![a.clone(), b.clone(), a.clone()]);
        assert!(matches!(result, Err(ClusterError::InvalidSite { id, .. }) if id == "A"));

        let collection = SiteCollection::try_new(vec![a, b]).unwrap();
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_collection_total_aggregate() {
        let a = Site::new("A", "a", Point::new(0.0, 0.0), create_test_chargers()).unwrap();
        let b = Site::new("B", "b", Point::new(1.0, 1.0), create_test_chargers()).unwrap();
        let collection = SiteCollection::new(vec![a, b]);

        assert_eq!(collection.len(), 2);
        assert!(!collection.is_empty());
        assert_eq!(collection.get(1).unwrap().id(), "B");
        assert_eq!(collection.total_aggregate(), SiteAggregate::new(6, 10));
    }
}
