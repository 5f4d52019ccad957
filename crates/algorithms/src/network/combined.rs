//! Spanning tree, k-nearest and hub networks from one cost matrix

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::graph::NetworkGraph;
use super::hub::{build_hub, HubOptions, HubSelection};
use super::knn::build_knn;
use super::matrix::CostMatrix;
use super::mst::build_mst;
use super::site::Site;
use archterra_core::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSetOptions {
    pub k: usize,
    pub mutual_only: bool,
    /// Its symmetry rule also drives the spanning tree
    pub hub: HubOptions,
}

impl Default for NetworkSetOptions {
    fn default() -> Self {
        Self {
            k: 3,
            mutual_only: false,
            hub: HubOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSet {
    pub mst: NetworkGraph,
    pub knn: NetworkGraph,
    /// `None` when hubs come from site flags and no site is flagged
    pub hub: Option<NetworkGraph>,
}

/// All three networks over the same matrix.
///
/// A disconnected spanning tree fails the whole set.
pub fn build_network_set(
    matrix: &CostMatrix,
    sites: &[Site],
    options: &NetworkSetOptions,
) -> Result<NetworkSet> {
    let mst = build_mst(matrix, sites, options.hub.symmetry)?;
    let knn = build_knn(matrix, sites, options.k, options.mutual_only)?;

    let hub = match options.hub.selection {
        HubSelection::Flagged if !sites.iter().any(|s| s.hub) => {
            debug!("no flagged hub sites, hub network skipped");
            None
        }
        _ => Some(build_hub(matrix, sites, &options.hub)?),
    };

    info!(
        "network set: mst {} edges, knn {} edges, hub {}",
        mst.edge_count(),
        knn.edge_count(),
        hub.as_ref()
            .map_or("skipped".to_string(), |g| format!("{} edges", g.edge_count()))
    );
    Ok(NetworkSet { mst, knn, hub })
}
