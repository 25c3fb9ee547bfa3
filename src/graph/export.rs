//! JSON documents for external visualizers.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{
    compute_metrics, compute_with_links, ContinuityLink, EpisodePoint, GraphBuild, Granularity,
    InteractionEdge, NodeMetrics, Provenance, WindowedNetwork,
};
use crate::episode::Role;
use crate::error::Result;

/// Layout and style hints passed through to the renderer untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Presentation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Per-window summary in a windowed export.
#[derive(Debug, Clone, Serialize)]
pub struct WindowSummary {
    pub name: String,
    pub episodes: usize,
    pub first_episode: Option<i64>,
    pub last_episode: Option<i64>,
    pub edges: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphDocument {
    pub title: String,
    pub provenance: Provenance,
    pub granularity: Granularity,
    pub episodes_used: usize,
    pub presentation: Presentation,
    pub nodes: Vec<NodeMetrics>,
    pub edges: Vec<InteractionEdge>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub continuity: Vec<ContinuityLink>,
    pub class_selections: BTreeMap<Role, usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub windows: Vec<WindowSummary>,
    /// Learning progress and attack counts per episode, for placing
    /// `first_seen` along training.
    pub timeline: Vec<EpisodePoint>,
}

impl GraphDocument {
    pub fn from_build(
        title: &str,
        build: &GraphBuild,
        granularity: Granularity,
        presentation: Presentation,
    ) -> Self {
        Self {
            title: title.to_string(),
            provenance: build.provenance,
            granularity,
            episodes_used: build.episodes_used,
            presentation,
            nodes: compute_metrics(&build.graph),
            edges: build.graph.edges(),
            continuity: Vec::new(),
            class_selections: build.class_selections.clone(),
            windows: Vec::new(),
            timeline: build.timeline.clone(),
        }
    }

    pub fn from_windowed(title: &str, network: &WindowedNetwork, presentation: Presentation) -> Self {
        let mut class_selections = BTreeMap::new();
        for slice in &network.slices {
            for (role, count) in &slice.build.class_selections {
                *class_selections.entry(*role).or_insert(0) += count;
            }
        }

        Self {
            title: title.to_string(),
            provenance: network.provenance,
            granularity: Granularity::Role,
            episodes_used: network.slices.iter().map(|s| s.build.episodes_used).sum(),
            presentation,
            nodes: compute_with_links(&network.graph, &network.continuity),
            edges: network.graph.edges(),
            continuity: network.continuity.clone(),
            class_selections,
            windows: network
                .slices
                .iter()
                .map(|slice| WindowSummary {
                    name: slice.window.name.clone(),
                    episodes: slice.build.episodes_used,
                    first_episode: slice.first_episode,
                    last_episode: slice.last_episode,
                    edges: slice.build.graph.edge_count(),
                })
                .collect(),
            timeline: network
                .slices
                .iter()
                .flat_map(|slice| slice.build.timeline.iter().cloned())
                .collect(),
        }
    }
}

/// Early vs late training comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonDocument {
    pub title: String,
    pub early: GraphDocument,
    pub late: GraphDocument,
}

/// Pretty-printed JSON for any export document.
pub fn to_json<T: Serialize>(document: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Write an export document to `path` as pretty-printed JSON.
pub fn write_json<T: Serialize>(document: &T, path: &Path) -> Result<()> {
    let json = to_json(document)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    log::info!("Wrote graph export to {}", path.display());
    Ok(())
}
