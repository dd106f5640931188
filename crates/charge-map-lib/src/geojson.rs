//! GeoJSON input and output for site collections
//!
//! Sites travel as a `FeatureCollection` of `Point` features whose properties carry the
//! site record:
//!
//! ```json
//! {"type": "FeatureCollection", "features": [
//!   {"type": "Feature",
//!    "geometry": {"type": "Point", "coordinates": [-122.41, 37.77]},
//!    "properties": {"id": "A", "name": "Mission Bay",
//!                   "chargers": [{"available": 2, "total": 4, "level": "L2"}]}}
//! ]}
//! ```
//!
//! Features that are not points or do not describe a valid site are skipped with a
//! warning; only a document that is not a feature collection at all is an error.

use crate::{Charger, Result, Site, SiteCollection, Station};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

/// A GeoJSON feature collection of sites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

/// A single site feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_kind")]
    pub kind: String,
    pub geometry: Geometry,
    pub properties: SiteProperties,
}

/// Feature geometry; only `Point` is accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`
    pub coordinates: Vec<f64>,
}

/// Site fields carried in a feature's properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteProperties {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub chargers: Vec<Charger>,
    #[serde(default)]
    pub stations: Vec<Station>,
}

fn feature_kind() -> String {
    "Feature".to_string()
}

/// Loosely typed collection so one bad feature does not reject the whole document
#[derive(Deserialize)]
struct RawFeatureCollection {
    features: Vec<serde_json::Value>,
}

/// Parse a feature collection into a new site snapshot
///
/// # Errors
/// [`crate::ClusterError::Json`] if the document is not a feature collection.
pub fn parse_feature_collection(json: &str) -> Result<SiteCollection> {
    let raw: RawFeatureCollection = serde_json::from_str(json)?;
    Ok(collect_sites(raw))
}

/// Read and parse a feature collection
///
/// # Errors
/// [`crate::ClusterError::Io`] on read failures, [`crate::ClusterError::Json`] if the
/// document is not a feature collection.
pub fn from_reader<R: Read>(mut reader: R) -> Result<SiteCollection> {
    let mut json = String::new();
    reader.read_to_string(&mut json)?;
    parse_feature_collection(&json)
}

/// Encode sites as a feature collection
pub fn to_feature_collection(sites: &[Arc<Site>]) -> FeatureCollection {
    FeatureCollection {
        kind: "FeatureCollection".to_string(),
        features: sites.iter().map(|site| to_feature(site)).collect(),
    }
}

fn to_feature(site: &Site) -> Feature {
    let location = site.location();
    Feature {
        kind: feature_kind(),
        geometry: Geometry {
            kind: "Point".to_string(),
            coordinates: vec![location.x(), location.y()],
        },
        properties: SiteProperties {
            id: site.id().to_string(),
            name: site.name().to_string(),
            chargers: site.chargers().to_vec(),
            stations: site.stations().to_vec(),
        },
    }
}

fn collect_sites(raw: RawFeatureCollection) -> SiteCollection {
    let total = raw.features.len();
    let mut seen = HashSet::with_capacity(total);
    let sites: Vec<Site> = raw
        .features
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| {
            let site = to_site(value).and_then(|site| {
                if seen.insert(site.id().to_string()) {
                    Ok(site)
                } else {
                    Err(format!("duplicate site id {}", site.id()))
                }
            });
            match site {
                Ok(site) => Some(site),
                Err(reason) => {
                    tracing::warn!("Skipping feature {}: {}", i, reason);
                    None
                }
            }
        })
        .collect();

    tracing::debug!("Parsed {} of {} features into sites", sites.len(), total);
    SiteCollection::new(sites)
}

fn to_site(value: serde_json::Value) -> std::result::Result<Site, String> {
    let feature: Feature = serde_json::from_value(value).map_err(|e| e.to_string())?;

    if feature.geometry.kind != "Point" {
        return Err(format!("unsupported geometry {}", feature.geometry.kind));
    }
    let [lng, lat] = feature.geometry.coordinates[..] else {
        return Err(format!(
            "expected 2 coordinates, got {}",
            feature.geometry.coordinates.len()
        ));
    };

    let SiteProperties {
        id,
        name,
        chargers,
        stations,
    } = feature.properties;
    Site::new(id, name, Point::new(lng, lat), chargers)
        .map(|site| site.with_stations(stations))
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClusterError, SiteAggregate};

    const SITES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-122.41, 37.77]},
                "properties": {
                    "id": "A",
                    "name": "Mission Bay",
                    "chargers": [{"available": 2, "total": 4, "level": "L2"}],
                    "stations": [
                        {"id": "s1", "name": "one", "status": "active", "meter_status": ["available"]}
                    ]
                }
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-122.42, 37.78]},
                "properties": {
                    "id": "B",
                    "name": "Marina",
                    "chargers": [{"available": 1, "total": 2, "level": "L2"}]
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let sites = parse_feature_collection(SITES).unwrap();
        assert_eq!(sites.len(), 2);

        let a = sites.get(0).unwrap();
        assert_eq!(a.id(), "A");
        assert_eq!(a.name(), "Mission Bay");
        assert_eq!(a.location(), Point::new(-122.41, 37.77));
        assert_eq!(a.stations().len(), 1);
        assert_eq!(a.stations()[0].meter_status, vec!["available".to_string()]);

        assert!(sites.get(1).unwrap().stations().is_empty());
        assert_eq!(sites.total_aggregate(), SiteAggregate::new(3, 6));
    }

    #[test]
    fn test_invalid_features_are_skipped() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [0, 0]},
                 "properties": {"id": "line"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0]},
                 "properties": {"id": "short"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [200, 0]},
                 "properties": {"id": "far"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]},
                 "properties": {"id": "over", "chargers": [{"available": 5, "total": 1, "level": "L2"}]}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]},
                 "properties": {"name": "no id"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]},
                 "properties": {"id": "ok"}}
            ]
        }"#;

        let sites = parse_feature_collection(json).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites.get(0).unwrap().id(), "ok");
    }

    #[test]
    fn test_duplicate_ids_keep_first_feature() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-122.41, 37.77]},
                 "properties": {"id": "A", "name": "San Francisco"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [2.35, 48.85]},
                 "properties": {"id": "A", "name": "Paris"}}
            ]
        }"#;

        let sites = parse_feature_collection(json).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites.get(0).unwrap().name(), "San Francisco");

        let index = crate::ClusterIndex::build(&sites, crate::ClusterOptions::default());
        let keys: Vec<String> = index
            .query(crate::Bound::world(), 15.0)
            .iter()
            .map(crate::SpatialNode::key)
            .collect();
        assert_eq!(keys, vec!["SITE-A"]);
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            parse_feature_collection("not json"),
            Err(ClusterError::Json(_))
        ));
        assert!(matches!(
            parse_feature_collection(r#"{"type": "FeatureCollection"}"#),
            Err(ClusterError::Json(_))
        ));
    }

    #[test]
    fn test_from_reader() {
        let sites = from_reader(SITES.as_bytes()).unwrap();
        assert_eq!(sites.len(), 2);
    }

    #[test]
    fn test_to_feature_collection() {
        let sites = parse_feature_collection(SITES).unwrap();
        let collection = to_feature_collection(sites.sites());

        assert_eq!(collection.kind, "FeatureCollection");
        assert_eq!(collection.features.len(), 2);
        assert_eq!(collection.features[0].geometry.coordinates, vec![-122.41, 37.77]);
        assert_eq!(collection.features[1].properties.id, "B");

        let json = serde_json::to_string(&collection).unwrap();
        let reparsed = parse_feature_collection(&json).unwrap();
        assert_eq!(reparsed.len(), 2);
        assert_eq!(reparsed.get(0).unwrap().as_ref(), sites.get(0).unwrap().as_ref());
    }
}
