use charge_map_lib::{Bound, ClusterOptions, Config};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Charge Map - Cluster EV charging sites for a map viewport
pub struct Settings {
    /// GeoJSON feature collection of sites to load ("-" reads stdin)
    #[clap(short, long, value_name = "FILE")]
    pub sites: PathBuf,

    /// Visible region as west,south,east,north in degrees
    #[clap(short, long, value_name = "W,S,E,N", value_parser = parse_bound, default_value = "-180,-90,180,90", allow_hyphen_values = true)]
    pub bbox: Bound,

    /// Map zoom level (fractional zooms are floored)
    #[clap(short, long, default_value = "0")]
    pub zoom: f64,

    /// Lowest zoom level that gets its own cluster level
    #[clap(long, default_value = "0")]
    pub min_zoom: u8,

    /// Highest zoom level at which sites are still clustered (max 30)
    #[clap(long, default_value = "14")]
    pub max_zoom: u8,

    /// Minimum number of sites required to form a cluster
    #[clap(long, default_value = "2")]
    pub min_points: u32,

    /// Cluster radius in pixels, relative to the tile extent
    #[clap(short, long, default_value = "40")]
    pub radius: f64,

    /// Tile extent in pixels
    #[clap(long, default_value = "512")]
    pub extent: f64,

    /// Maximum points per quadtree node before subdivision
    #[clap(long, default_value = "64")]
    pub node_capacity: usize,

    /// Zoom added on top of a cluster's expansion zoom when zooming onto it
    #[clap(long, default_value = "0.7")]
    pub expansion_epsilon: f64,

    /// Print the camera target that splits this cluster instead of the clusters
    #[clap(long, value_name = "CLUSTER_ID", conflicts_with_all = ["leaves", "summary"])]
    pub expand: Option<u64>,

    /// Print the sites under this cluster instead of the clusters
    #[clap(long, value_name = "CLUSTER_ID", conflicts_with = "summary")]
    pub leaves: Option<u64>,

    /// Maximum number of sites printed with --leaves
    #[clap(long, default_value = "10")]
    pub limit: usize,

    /// Number of sites skipped with --leaves
    #[clap(long, default_value = "0")]
    pub offset: usize,

    /// Print charger and station totals for the sites inside the region
    #[clap(long, default_value = "false")]
    pub summary: bool,

    /// Pretty-print the JSON output
    #[clap(long, default_value = "false")]
    pub pretty: bool,
}

impl Settings {
    /// Controller configuration from the command-line options
    pub fn config(&self) -> Config {
        Config {
            cluster: ClusterOptions {
                min_zoom: self.min_zoom,
                max_zoom: self.max_zoom,
                min_points: self.min_points,
                radius: self.radius,
                extent: self.extent,
                node_capacity: self.node_capacity,
            },
            expansion_epsilon: self.expansion_epsilon,
            recluster_on_dismiss: false,
        }
    }
}

/// Parse `west,south,east,north`
fn parse_bound(value: &str) -> Result<Bound, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| format!("invalid coordinate: {e}"))?;

    let [west, south, east, north] = parts[..] else {
        return Err(format!("expected 4 values, got {}", parts.len()));
    };
    if !(south <= north) {
        return Err(format!("south {south} is above north {north}"));
    }
    Ok(Bound::new(west, south, east, north))
}
