//! Charge Map command-line front end
//!
//! Loads a GeoJSON site collection, drives a [`ClusterController`] for one viewport and
//! prints the result as JSON on stdout.

mod logging;
mod output;
mod settings;

use charge_map_lib::{
    ClusterController, CollectionSummary, Result, SiteCollection, Viewport, geojson,
};
use clap::Parser;
use output::{NodeOutput, Output, TargetOutput};
use settings::Settings;
use std::path::Path;

fn main() -> Result<()> {
    logging::setup_logging();
    let settings = Settings::parse();

    let sites = load_sites(&settings.sites)?;
    let output = run(&settings, &sites)?;

    let stdout = std::io::stdout().lock();
    if settings.pretty {
        serde_json::to_writer_pretty(stdout, &output)?;
    } else {
        serde_json::to_writer(stdout, &output)?;
    }
    println!();

    profiling::finish_frame!();
    Ok(())
}

/// Read sites from a file, or from stdin for `-`
fn load_sites(path: &Path) -> Result<SiteCollection> {
    profiling::scope!("load_sites");

    let sites = if path == Path::new("-") {
        geojson::from_reader(std::io::stdin().lock())?
    } else {
        let file = std::fs::File::open(path)?;
        geojson::from_reader(std::io::BufReader::new(file))?
    };
    tracing::info!("Loaded {} sites from {}", sites.len(), path.display());
    Ok(sites)
}

fn run(settings: &Settings, sites: &SiteCollection) -> Result<Output> {
    let mut controller = ClusterController::new(settings.config());
    controller.sites_changed(sites);

    if let Some(cluster_id) = settings.expand {
        let target = controller.expansion_target(cluster_id)?;
        return Ok(Output::Target(TargetOutput::new(cluster_id, target)));
    }

    if let Some(cluster_id) = settings.leaves {
        let leaves = match controller.index() {
            Some(index) => index.leaves(cluster_id, settings.limit, settings.offset)?,
            None => Vec::new(),
        };
        return Ok(Output::Nodes(leaves.iter().map(NodeOutput::from).collect()));
    }

    if settings.summary {
        let inside: CollectionSummary = sites
            .sites()
            .iter()
            .filter(|site| settings.bbox.contains(site.location()))
            .map(|site| site.as_ref())
            .collect();
        return Ok(Output::Summary(inside.sections()));
    }

    controller.viewport_changed(Viewport::new(settings.bbox, settings.zoom));
    let stats = controller.stats();
    tracing::info!(
        "{} nodes at zoom {} (build {:.2}ms, query {:.2}ms)",
        stats.last_query_nodes,
        settings.zoom,
        stats.last_build_time_ms,
        stats.last_query_time_ms
    );
    Ok(Output::Nodes(
        controller.clusters().iter().map(NodeOutput::from).collect(),
    ))
}
