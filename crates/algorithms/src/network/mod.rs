//! Site networks
//!
//! Pairwise least-cost matrices between sites, networks built from them
//! (minimum spanning tree, k-nearest neighbours, hub and spoke, or all three
//! at once), planar proximity graphs (Delaunay, Gabriel, relative
//! neighbourhood), intervisibility graphs, centrality measures, and the
//! least-cost routes behind each network edge.

mod centrality;
mod combined;
mod delaunay;
mod graph;
mod hub;
mod intervisibility;
mod kdtree;
mod knn;
mod matrix;
mod mst;
mod paths;
mod proximity;
mod site;

pub use centrality::{centrality, CentralityOptions, NodeCentrality};
pub use combined::{build_network_set, NetworkSet, NetworkSetOptions};
pub use graph::{Edge, EdgeKind, NetworkGraph, UnionFind};
pub use hub::{build_hub, HubOptions, HubSelection};
pub use intervisibility::{
    intervisibility_graph, IntervisibilityOptions, IntervisibilityOutput, PairFailure,
    VisibilityRule,
};
pub use kdtree::{KdTree, Neighbor};
pub use knn::build_knn;
pub use matrix::{euclidean_matrix, pairwise_least_cost, CostMatrix, PairwiseCosts, Symmetry};
pub use mst::build_mst;
pub use paths::{edge_paths, EdgePath};
pub use proximity::{proximity_graph, ProximityOptions, ProximityRule};
pub use site::{Site, SiteFailure};
