//! JSON shapes printed by the binary

use charge_map_lib::{CameraTarget, LeafNode, SiteAggregate, SpatialNode, SummarySection};
use serde::Serialize;

/// A visible node, flattened for map clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOutput {
    pub key: String,
    pub kind: &'static str,
    /// `[longitude, latitude]`
    pub position: [f64; 2],
    pub point_count: u32,
    #[serde(flatten)]
    pub aggregate: SiteAggregate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl From<&SpatialNode> for NodeOutput {
    fn from(node: &SpatialNode) -> Self {
        let position = node.position();
        let base = Self {
            key: node.key(),
            kind: "cluster",
            position: [position.x(), position.y()],
            point_count: node.point_count(),
            aggregate: node.aggregate(),
            cluster_id: None,
            name: None,
            level: None,
        };

        match node {
            SpatialNode::Cluster(cluster) => Self {
                cluster_id: Some(cluster.id),
                ..base
            },
            SpatialNode::Leaf(leaf) => Self {
                kind: "site",
                name: Some(leaf.site.name().to_string()),
                level: Some(leaf.site.level_summary()),
                ..base
            },
        }
    }
}

impl From<&LeafNode> for NodeOutput {
    fn from(leaf: &LeafNode) -> Self {
        Self::from(&SpatialNode::Leaf(leaf.clone()))
    }
}

/// Camera target for a cluster
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetOutput {
    pub cluster_id: u64,
    /// `[longitude, latitude]`
    pub center: [f64; 2],
    pub zoom: f64,
}

impl TargetOutput {
    pub fn new(cluster_id: u64, target: CameraTarget) -> Self {
        Self {
            cluster_id,
            center: [target.center.x(), target.center.y()],
            zoom: target.zoom,
        }
    }
}

/// Everything the binary can print
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    Nodes(Vec<NodeOutput>),
    Target(TargetOutput),
    Summary(Vec<SummarySection>),
}
