//! Interaction graph: typed, weighted, directed edges between roles or agents.
//!
//! Built by [`build_graph`] from episode records, split into training windows
//! by [`build_windowed`], scored by [`compute_metrics`] and serialized by
//! [`export`].

pub mod export;
mod inference;
mod metrics;
mod windows;

pub use inference::{build_graph, EpisodePoint, GraphBuild};
pub use metrics::{compute_metrics, compute_with_links, top_by, NodeMetrics};
pub use windows::{build_windowed, split_windows, ContinuityLink, Window, WindowSlice, WindowedNetwork};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::episode::Role;

/// Kind of an interaction edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Damage,
    Heal,
    Threat,
    Taunt,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 4] = [EdgeKind::Damage, EdgeKind::Heal, EdgeKind::Threat, EdgeKind::Taunt];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Damage => "damage",
            EdgeKind::Heal => "heal",
            EdgeKind::Threat => "threat",
            EdgeKind::Taunt => "taunt",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Whether nodes stand for roles or for individual agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Role,
    Agent,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "role" => Ok(Granularity::Role),
            "agent" => Ok(Granularity::Agent),
            other => Err(format!("unknown granularity '{}' (expected role or agent)", other)),
        }
    }
}

/// Node id of an agent in agent granularity.
///
/// Agents pick a class every episode, so the id carries the role the agent
/// played; one node never stands for two roles.
pub fn agent_node(agent_id: &str, role: Role) -> String {
    format!("{} ({})", agent_id, role)
}

/// Data source the edges of a graph were derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provenance {
    Events,
    ExplicitTargets,
    Inferred,
    Mixed,
    #[default]
    None,
}

impl Provenance {
    pub fn label(&self) -> &'static str {
        match self {
            Provenance::Events => "events",
            Provenance::ExplicitTargets => "explicit targets",
            Provenance::Inferred => "actions (inferred)",
            Provenance::Mixed => "mixed",
            Provenance::None => "none",
        }
    }

    /// Provenance of a graph combining two sources.
    pub fn combine(self, other: Provenance) -> Provenance {
        match (self, other) {
            (Provenance::None, p) | (p, Provenance::None) => p,
            (a, b) if a == b => a,
            _ => Provenance::Mixed,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl Serialize for Provenance {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Accumulated contributions to one (source, target, kind) edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeStats {
    pub weight: f64,
    /// Distinct contributing episode numbers.
    pub episodes: BTreeSet<i64>,
}

impl EdgeStats {
    /// Lowest contributing episode number.
    pub fn first_seen(&self) -> Option<i64> {
        self.episodes.iter().next().copied()
    }
}

/// One edge of an [`InteractionGraph`], with node roles attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionEdge {
    pub source: String,
    pub target: String,
    pub source_role: Role,
    pub target_role: Role,
    pub kind: EdgeKind,
    pub weight: f64,
    pub first_seen: Option<i64>,
    pub episode_count: usize,
}

type EdgeKey = (String, String, EdgeKind);

/// Directed multigraph keyed by (source, target, kind); parallel
/// contributions sum.
///
/// Ordered maps keep iteration (and therefore reports and exports)
/// deterministic regardless of input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionGraph {
    nodes: BTreeMap<String, Role>,
    edges: BTreeMap<EdgeKey, EdgeStats>,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Ids are expected to map to a single role; the first
    /// role registered for an id is kept.
    pub fn add_node(&mut self, id: &str, role: Role) {
        self.nodes.entry(id.to_string()).or_insert(role);
    }

    /// Add `weight` to the (source, target, kind) edge, creating both nodes.
    pub fn add_edge(
        &mut self,
        (source, source_role): (&str, Role),
        (target, target_role): (&str, Role),
        kind: EdgeKind,
        weight: f64,
        episode: i64,
    ) {
        self.add_node(source, source_role);
        self.add_node(target, target_role);
        let stats = self
            .edges
            .entry((source.to_string(), target.to_string(), kind))
            .or_default();
        stats.weight += weight;
        stats.episodes.insert(episode);
    }

    /// Sum another graph into this one.
    pub fn merge(&mut self, other: &InteractionGraph) {
        for (id, role) in &other.nodes {
            self.add_node(id, *role);
        }
        for (key, stats) in &other.edges {
            let entry = self.edges.entry(key.clone()).or_default();
            entry.weight += stats.weight;
            entry.episodes.extend(stats.episodes.iter().copied());
        }
    }

    /// Copy of this graph with every node id passed through `rename`.
    pub fn relabeled(&self, rename: impl Fn(&str) -> String) -> InteractionGraph {
        let mut out = InteractionGraph::new();
        for (id, role) in &self.nodes {
            out.add_node(&rename(id), *role);
        }
        for ((source, target, kind), stats) in &self.edges {
            let entry = out
                .edges
                .entry((rename(source), rename(target), *kind))
                .or_default();
            entry.weight += stats.weight;
            entry.episodes.extend(stats.episodes.iter().copied());
        }
        out
    }

    /// Drop non-positive edges and floor the rest to `min_weight`.
    pub(crate) fn finalize(&mut self, min_weight: f64) {
        self.edges.retain(|_, stats| stats.weight > 0.0);
        for stats in self.edges.values_mut() {
            stats.weight = stats.weight.max(min_weight);
        }
    }

    /// Derive Tank→Boss taunt edges from Tank→Boss damage when the graph has
    /// no taunt edges at all.
    pub(crate) fn derive_taunt_from_damage(&mut self, ratio: f64, min_weight: f64) {
        if ratio <= 0.0 || self.edges.keys().any(|(_, _, kind)| *kind == EdgeKind::Taunt) {
            return;
        }
        let derived: Vec<(EdgeKey, EdgeStats)> = self
            .edges
            .iter()
            .filter(|((source, target, kind), _)| {
                *kind == EdgeKind::Damage
                    && self.nodes.get(source) == Some(&Role::Tank)
                    && self.nodes.get(target) == Some(&Role::Boss)
            })
            .map(|((source, target, _), stats)| {
                let taunt = EdgeStats {
                    weight: (stats.weight * ratio).max(min_weight),
                    episodes: stats.episodes.clone(),
                };
                ((source.clone(), target.clone(), EdgeKind::Taunt), taunt)
            })
            .collect();
        if !derived.is_empty() {
            log::debug!("No taunt data; derived {} taunt edges from Tank damage", derived.len());
        }
        self.edges.extend(derived);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// True when the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&str, Role)> {
        self.nodes.iter().map(|(id, role)| (id.as_str(), *role))
    }

    pub fn role_of(&self, node: &str) -> Option<Role> {
        self.nodes.get(node).copied()
    }

    pub fn stats(&self, source: &str, target: &str, kind: EdgeKind) -> Option<&EdgeStats> {
        self.edges
            .get(&(source.to_string(), target.to_string(), kind))
    }

    /// Weight of one edge, 0 when absent.
    pub fn weight(&self, source: &str, target: &str, kind: EdgeKind) -> f64 {
        self.stats(source, target, kind)
            .map(|s| s.weight)
            .unwrap_or(0.0)
    }

    pub fn total_weight(&self, kind: EdgeKind) -> f64 {
        self.edges
            .iter()
            .filter(|((_, _, k), _)| *k == kind)
            .map(|(_, stats)| stats.weight)
            .sum()
    }

    /// Raw (source, target, kind, weight) view without cloning ids.
    pub fn weighted_edges(&self) -> impl Iterator<Item = (&str, &str, EdgeKind, f64)> {
        self.edges
            .iter()
            .map(|((s, t, k), stats)| (s.as_str(), t.as_str(), *k, stats.weight))
    }

    pub fn edges(&self) -> Vec<InteractionEdge> {
        self.edges
            .iter()
            .map(|((source, target, kind), stats)| InteractionEdge {
                source: source.clone(),
                target: target.clone(),
                source_role: self.nodes.get(source).copied().unwrap_or(Role::RangedDps),
                target_role: self.nodes.get(target).copied().unwrap_or(Role::RangedDps),
                kind: *kind,
                weight: stats.weight,
                first_seen: stats.first_seen(),
                episode_count: stats.episodes.len(),
            })
            .collect()
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> Vec<InteractionEdge> {
        self.edges().into_iter().filter(|e| e.kind == kind).collect()
    }
}
