//! Charger and station totals over a set of sites
//!
//! Feeds a metrics screen: one titled section per metric family, each a list of
//! key/value rows suitable for a bar chart.

use crate::{Site, SiteAggregate};
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Totals over a set of sites
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CollectionSummary {
    /// Available and total chargers summed over every site
    pub chargers: SiteAggregate,
    /// Number of stations per station status
    pub stations: BTreeMap<String, u64>,
    /// Number of meters per meter status, across all stations
    pub charger_status: BTreeMap<String, u64>,
}

/// One key/value pair of a summary section
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SummaryRow {
    pub key: String,
    pub value: u64,
}

/// A titled list of rows
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SummarySection {
    pub title: String,
    pub rows: Vec<SummaryRow>,
}

impl CollectionSummary {
    /// Summarize the given sites
    pub fn from_sites(sites: &[Arc<Site>]) -> Self {
        let mut summary = Self::default();
        for site in sites {
            summary.add_site(site);
        }
        summary
    }

    fn add_site(&mut self, site: &Site) {
        self.chargers += site.aggregate();

        for station in site.stations() {
            *self.stations.entry(station.status.clone()).or_default() += 1;
            for status in &station.meter_status {
                *self.charger_status.entry(status.clone()).or_default() += 1;
            }
        }
    }

    /// The summary as `chargers`, `stations` and `charger status` sections
    ///
    /// Rows of the status sections are ordered by key.
    pub fn sections(&self) -> Vec<SummarySection> {
        let rows = |map: &BTreeMap<String, u64>| -> Vec<SummaryRow> {
            map.iter()
                .map(|(key, &value)| SummaryRow {
                    key: key.clone(),
                    value,
                })
                .collect()
        };

        vec![
            SummarySection {
                title: "chargers".to_string(),
                rows: vec![
                    SummaryRow {
                        key: "available".to_string(),
                        value: self.chargers.available_stations,
                    },
                    SummaryRow {
                        key: "total".to_string(),
                        value: self.chargers.total_stations,
                    },
                ],
            },
            SummarySection {
                title: "stations".to_string(),
                rows: rows(&self.stations),
            },
            SummarySection {
                title: "charger status".to_string(),
                rows: rows(&self.charger_status),
            },
        ]
    }
}

impl<'a> FromIterator<&'a Site> for CollectionSummary {
    fn from_iter<I: IntoIterator<Item = &'a Site>>(iter: I) -> Self {
        let mut summary = Self::default();
        for site in iter {
            summary.add_site(site);
        }
        summary
    }
}
