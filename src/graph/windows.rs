//! Role × training-window ("dense") network.

use serde::Serialize;
use std::collections::BTreeSet;
use std::ops::Range;

use super::{build_graph, GraphBuild, Granularity, InteractionGraph, Provenance};
use crate::config::InferenceParams;
use crate::episode::{Episode, Role};
use crate::error::{Result, SnaError};

const WINDOW_NAMES: [&str; 5] = ["early", "mid_early", "mid", "mid_late", "late"];

/// A contiguous slice of the ordered episode list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Window {
    pub name: String,
    /// Index range into the episode list; empty when there are fewer
    /// episodes than windows.
    #[serde(skip)]
    pub indices: Range<usize>,
}

/// Split `len` episodes into `count` windows of `max(1, len / count)`
/// episodes each; the last window takes the remainder.
pub fn split_windows(len: usize, count: usize) -> Result<Vec<Window>> {
    if count == 0 {
        return Err(SnaError::InvalidInput(
            "window count must be at least 1".to_string(),
        ));
    }
    let size = (len / count).max(1);

    Ok((0..count)
        .map(|i| {
            let start = (i * size).min(len);
            let end = if i == count - 1 { len } else { ((i + 1) * size).min(len) };
            Window {
                name: window_name(i),
                indices: start..end.max(start),
            }
        })
        .collect())
}

fn window_name(index: usize) -> String {
    WINDOW_NAMES
        .get(index)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("window_{}", index))
}

/// Same-role link between consecutive windows, kept apart from interaction edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinuityLink {
    pub source: String,
    pub target: String,
    pub role: Role,
    pub weight: f64,
}

/// One window's episodes and the role graph built from them.
#[derive(Debug, Clone)]
pub struct WindowSlice {
    pub window: Window,
    pub first_episode: Option<i64>,
    pub last_episode: Option<i64>,
    pub build: GraphBuild,
}

/// All windows merged into one graph with `<Role>_<window>` nodes.
#[derive(Debug, Clone)]
pub struct WindowedNetwork {
    pub slices: Vec<WindowSlice>,
    pub graph: InteractionGraph,
    pub continuity: Vec<ContinuityLink>,
    pub provenance: Provenance,
}

impl WindowedNetwork {
    pub fn window_names(&self) -> Vec<&str> {
        self.slices.iter().map(|s| s.window.name.as_str()).collect()
    }
}

/// Build the windowed network over `episodes` in their given order.
pub fn build_windowed(
    episodes: &[Episode],
    count: usize,
    params: &InferenceParams,
) -> Result<WindowedNetwork> {
    let windows = split_windows(episodes.len(), count)?;

    let mut slices = Vec::with_capacity(windows.len());
    let mut graph = InteractionGraph::new();
    let mut provenance = Provenance::None;
    let mut roles = BTreeSet::new();

    for window in windows {
        let slice = &episodes[window.indices.clone()];
        let build = build_graph(slice, None, params, Granularity::Role);

        let suffix = window.name.clone();
        graph.merge(&build.graph.relabeled(|node| format!("{}_{}", node, suffix)));
        roles.extend(build.graph.nodes().map(|(_, role)| role));
        provenance = provenance.combine(build.provenance);

        log::debug!(
            "Window {}: {} episodes, {} edges",
            window.name,
            slice.len(),
            build.graph.edge_count()
        );
        slices.push(WindowSlice {
            first_episode: slice.first().map(|ep| ep.episode),
            last_episode: slice.last().map(|ep| ep.episode),
            window,
            build,
        });
    }

    // Every seen role gets a node in every window so continuity chains are unbroken
    let mut continuity = Vec::new();
    for role in &roles {
        for slice in &slices {
            graph.add_node(&format!("{}_{}", role, slice.window.name), *role);
        }
        for pair in slices.windows(2) {
            continuity.push(ContinuityLink {
                source: format!("{}_{}", role, pair[0].window.name),
                target: format!("{}_{}", role, pair[1].window.name),
                role: *role,
                weight: 1.0,
            });
        }
    }

    log::info!(
        "Built windowed network: {} windows, {} nodes, {} edges, {} continuity links",
        slices.len(),
        graph.node_count(),
        graph.edge_count(),
        continuity.len()
    );

    Ok(WindowedNetwork {
        slices,
        graph,
        continuity,
        provenance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{Action, Branch, Roster};
    use crate::graph::EdgeKind;

    fn melee_episode(number: i64) -> Episode {
        Episode {
            episode: number,
            roster: Roster::from_labels(vec![("melee", Some("MeleeDPS".to_string()))]),
            actions: vec![Action {
                frame: 1,
                agent_id: "melee".to_string(),
                branch: Branch::Attack,
                value: 1.0,
                target_id: None,
            }],
            ..Episode::default()
        }
    }

    #[test]
    fn test_split_windows_remainder_in_last() {
        let windows = split_windows(11, 5).unwrap();
        let sizes: Vec<usize> = windows.iter().map(|w| w.indices.len()).collect();
        assert_eq!(sizes, vec![2, 2, 2, 2, 3]);
        assert_eq!(windows[0].name, "early");
        assert_eq!(windows[4].name, "late");
    }

    #[test]
    fn test_split_windows_more_windows_than_episodes() {
        let windows = split_windows(2, 4).unwrap();
        let sizes: Vec<usize> = windows.iter().map(|w| w.indices.len()).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_split_windows_names_beyond_five() {
        let windows = split_windows(7, 7).unwrap();
        assert_eq!(windows[5].name, "window_5");
        assert!(split_windows(3, 0).is_err());
    }

    #[test]
    fn test_windowed_network_nodes_and_continuity() {
        let episodes: Vec<Episode> = (1..=4).map(melee_episode).collect();
        let network = build_windowed(&episodes, 2, &InferenceParams::default()).unwrap();

        assert_eq!(network.window_names(), vec!["early", "mid_early"]);
        assert_eq!(network.graph.weight("MeleeDPS_early", "Boss_early", EdgeKind::Damage), 20.0);
        assert_eq!(network.provenance, Provenance::Inferred);

        // One link per role between the two windows
        assert_eq!(network.continuity.len(), 2);
        for link in &network.continuity {
            let role = link.role.as_str();
            assert_eq!(link.source, format!("{}_early", role));
            assert_eq!(link.target, format!("{}_mid_early", role));
        }
        // Interaction edges never cross windows
        for edge in network.graph.edges() {
            let source_window = edge.source.split_once('_').map(|(_, w)| w.to_string());
            let target_window = edge.target.split_once('_').map(|(_, w)| w.to_string());
            assert_eq!(source_window, target_window);
        }
    }

    #[test]
    fn test_windowed_slices_record_episode_bounds() {
        let episodes: Vec<Episode> = (10..15).map(melee_episode).collect();
        let network = build_windowed(&episodes, 2, &InferenceParams::default()).unwrap();
        assert_eq!(network.slices[0].first_episode, Some(10));
        assert_eq!(network.slices[0].last_episode, Some(11));
        assert_eq!(network.slices[1].first_episode, Some(12));
        assert_eq!(network.slices[1].last_episode, Some(14));
    }
}
