//! Per-site charger summaries
//!
//! These are the leaf values of the cluster index: every site contributes its
//! [`SiteAggregate`] and clusters carry the pointwise sum of their members.

use crate::Charger;
use smallvec::SmallVec;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Level summary used when a site has no chargers
pub const NO_LEVEL: &str = "N/A";

/// Summed charger availability over one or more sites
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SiteAggregate {
    /// Chargers currently available
    pub available_stations: u64,
    /// Chargers installed
    pub total_stations: u64,
}

impl SiteAggregate {
    pub const fn new(available_stations: u64, total_stations: u64) -> Self {
        Self {
            available_stations,
            total_stations,
        }
    }
}

impl Add for SiteAggregate {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            available_stations: self.available_stations + rhs.available_stations,
            total_stations: self.total_stations + rhs.total_stations,
        }
    }
}

impl AddAssign for SiteAggregate {
    fn add_assign(&mut self, rhs: Self) {
        self.available_stations += rhs.available_stations;
        self.total_stations += rhs.total_stations;
    }
}

impl Sum for SiteAggregate {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a SiteAggregate> for SiteAggregate {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Sum `available` and `total` over a site's chargers
///
/// Charger integrity is not checked here; see [`crate::Site::new`].
#[inline]
pub fn aggregate(chargers: &[Charger]) -> SiteAggregate {
    chargers
        .iter()
        .map(|charger| SiteAggregate::new(charger.available.into(), charger.total.into()))
        .sum()
}

/// Sorted, de-duplicated charger levels joined with `+`, or `"N/A"` without chargers
pub fn level_summary(chargers: &[Charger]) -> String {
    let mut levels: SmallVec<[&str; 4]> =
        chargers.iter().map(|charger| charger.level.as_str()).collect();
    if levels.is_empty() {
        return NO_LEVEL.to_string();
    }
    levels.sort_unstable();
    levels.dedup();
    levels.join("+")
}
