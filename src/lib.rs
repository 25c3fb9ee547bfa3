pub mod config;
pub mod error;
pub mod episode;
pub mod graph;
pub mod stats;

pub use config::{Config, InferenceParams};
pub use error::{Result, SnaError};
pub use episode::{Action, Branch, Episode, Role, Roster};
pub use graph::{build_graph, EdgeKind, Granularity, GraphBuild, InteractionGraph, Provenance};
