//! Edge inference from episode records.
//!
//! Each episode picks the best source it carries: explicit combat events,
//! then actions with explicit targets, then heuristic inference over the
//! bare action stream. Contributions are summed across episodes and the
//! merged graph is finalized once.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;

use super::{agent_node, EdgeKind, Granularity, InteractionGraph, Provenance};
use crate::config::InferenceParams;
use crate::episode::{Branch, Episode, EventKind, Role};

/// Boss node id when the roster names no boss agent.
pub const DEFAULT_BOSS_NODE: &str = "Boss";

/// Result of one graph build.
#[derive(Debug, Clone, Default)]
pub struct GraphBuild {
    pub graph: InteractionGraph,
    /// Valid class selections per selected role.
    pub class_selections: BTreeMap<Role, usize>,
    pub provenance: Provenance,
    pub episodes_used: usize,
    /// Events or targeted actions rejected for an invalid role combination.
    pub discarded: usize,
    /// One point per used episode, ordered by episode number.
    pub timeline: Vec<EpisodePoint>,
}

/// Training progress and attack activity of one episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodePoint {
    pub episode: i64,
    pub learning_progress: f64,
    /// Triggered attack actions.
    pub attacks: usize,
    pub attacks_by_agent: BTreeMap<String, usize>,
}

impl EpisodePoint {
    fn from_episode(episode: &Episode) -> Self {
        let mut attacks_by_agent: BTreeMap<String, usize> = BTreeMap::new();
        for action in &episode.actions {
            if action.branch == Branch::Attack && action.is_triggered() {
                *attacks_by_agent.entry(action.agent_id.clone()).or_insert(0) += 1;
            }
        }
        Self {
            episode: episode.episode,
            learning_progress: episode.learning_progress,
            attacks: attacks_by_agent.values().sum(),
            attacks_by_agent,
        }
    }
}

/// Build an interaction graph from `episodes`.
///
/// `range` restricts the build to episodes whose number falls inside it.
/// Summation makes the result independent of episode order.
pub fn build_graph(
    episodes: &[Episode],
    range: Option<RangeInclusive<i64>>,
    params: &InferenceParams,
    granularity: Granularity,
) -> GraphBuild {
    let mut build = GraphBuild::default();

    for episode in episodes {
        if let Some(range) = &range {
            if !range.contains(&episode.episode) {
                continue;
            }
        }
        build.episodes_used += 1;

        let mut builder = EpisodeBuilder::new(episode, params, granularity);
        let source = builder.run();
        log::debug!(
            "Episode {}: {} edges from {}",
            episode.episode,
            builder.graph.edge_count(),
            source
        );

        build.provenance = build.provenance.combine(source);
        build.discarded += builder.discarded;
        build.graph.merge(&builder.graph);
        count_class_selections(episode, params, &mut build.class_selections);
        build.timeline.push(EpisodePoint::from_episode(episode));
    }

    build.timeline.sort_by(|a, b| {
        a.episode
            .cmp(&b.episode)
            .then(a.learning_progress.total_cmp(&b.learning_progress))
            .then(a.attacks_by_agent.cmp(&b.attacks_by_agent))
    });

    build.graph.finalize(params.min_edge_weight);
    build
        .graph
        .derive_taunt_from_damage(params.taunt_from_damage_ratio, params.min_edge_weight);

    if build.discarded > 0 {
        log::warn!(
            "Discarded {} interactions with an invalid source/target role combination",
            build.discarded
        );
    }
    log::info!(
        "Built graph from {} episodes: {} nodes, {} edges ({})",
        build.episodes_used,
        build.graph.node_count(),
        build.graph.edge_count(),
        build.provenance
    );
    build
}

/// Count valid class selections once per (episode, agent).
fn count_class_selections(
    episode: &Episode,
    params: &InferenceParams,
    counts: &mut BTreeMap<Role, usize>,
) {
    let mut seen = HashSet::new();
    for action in &episode.actions {
        if action.branch != Branch::ClassSelection
            || action.value < 0.0
            || params.is_no_selection(action.value)
        {
            continue;
        }
        if !seen.insert(action.agent_id.as_str()) {
            continue;
        }
        let role = selected_role(action.value).unwrap_or_else(|| episode.role_of(&action.agent_id));
        *counts.entry(role).or_insert(0) += 1;
    }
}

fn selected_role(value: f64) -> Option<Role> {
    if value.fract() == 0.0 {
        Role::from_class_index(value as i64)
    } else {
        None
    }
}

type Node = (String, Role);

/// Per-episode edge accumulation.
struct EpisodeBuilder<'a> {
    episode: &'a Episode,
    params: &'a InferenceParams,
    granularity: Granularity,
    boss_node: String,
    graph: InteractionGraph,
    discarded: usize,
}

impl<'a> EpisodeBuilder<'a> {
    fn new(episode: &'a Episode, params: &'a InferenceParams, granularity: Granularity) -> Self {
        let boss_node = match granularity {
            Granularity::Role => DEFAULT_BOSS_NODE,
            Granularity::Agent => episode.roster.boss_id().unwrap_or(DEFAULT_BOSS_NODE),
        }
        .to_string();

        Self {
            episode,
            params,
            granularity,
            boss_node,
            graph: InteractionGraph::new(),
            discarded: 0,
        }
    }

    fn run(&mut self) -> Provenance {
        if self.episode.has_combat_events() {
            self.from_events();
            Provenance::Events
        } else if self.episode.has_explicit_targets() {
            self.from_targets();
            Provenance::ExplicitTargets
        } else if !self.episode.actions.is_empty() {
            self.infer();
            Provenance::Inferred
        } else {
            Provenance::None
        }
    }

    fn node_for(&self, agent_id: &str, role: Role) -> String {
        match (role, self.granularity) {
            (Role::Boss, _) => self.boss_node.clone(),
            (role, Granularity::Role) => role.as_str().to_string(),
            (role, Granularity::Agent) => agent_node(agent_id, role),
        }
    }

    fn node(&self, agent_id: &str) -> Node {
        let role = self.episode.role_of(agent_id);
        (self.node_for(agent_id, role), role)
    }

    fn boss(&self) -> Node {
        (self.boss_node.clone(), Role::Boss)
    }

    fn add(&mut self, source: &Node, target: &Node, kind: EdgeKind, weight: f64) {
        self.graph.add_edge(
            (&source.0, source.1),
            (&target.0, target.1),
            kind,
            weight,
            self.episode.episode,
        );
    }

    fn from_events(&mut self) {
        let episode = self.episode;
        for event in &episode.events {
            let Some(kind) = event.kind() else {
                continue;
            };
            if !event.amount.is_finite() {
                self.discarded += 1;
                continue;
            }

            let source = self.node(&event.source);
            let target = self.node(&event.target);
            let (valid, edge_kind) = match kind {
                EventKind::Damage => (source.1.is_boss() != target.1.is_boss(), EdgeKind::Damage),
                EventKind::Heal => (source.1 == Role::Healer && !target.1.is_boss(), EdgeKind::Heal),
                EventKind::Threat => (!source.1.is_boss() && target.1.is_boss(), EdgeKind::Threat),
                EventKind::Taunt => (source.1 == Role::Tank && target.1.is_boss(), EdgeKind::Taunt),
            };

            if valid {
                self.add(&source, &target, edge_kind, event.amount);
            } else {
                self.discarded += 1;
            }
        }
    }

    fn from_targets(&mut self) {
        let episode = self.episode;
        let params = self.params;
        let boss = self.boss();

        for action in episode.actions.iter().filter(|a| a.is_triggered()) {
            let Some(target_id) = action.target() else {
                continue;
            };
            let source = self.node(&action.agent_id);
            let target = self.node(target_id);

            match action.branch {
                Branch::Attack => {
                    if source.1.is_boss() && !target.1.is_boss() {
                        self.add(&source, &target, EdgeKind::Damage, params.boss_damage);
                    } else if !source.1.is_boss() && target.1.is_boss() {
                        self.add(&source, &target, EdgeKind::Damage, params.damage_for(source.1));
                        self.add(&source, &target, EdgeKind::Threat, params.attack_threat(source.1));
                    } else {
                        self.discarded += 1;
                    }
                }
                Branch::Heal => {
                    if source.1 == Role::Healer && !target.1.is_boss() {
                        self.add(&source, &target, EdgeKind::Heal, params.heal_amount);
                        self.add(&source, &boss, EdgeKind::Threat, params.heal_threat);
                    } else {
                        self.discarded += 1;
                    }
                }
                Branch::ThreatBoost | Branch::Taunt => {
                    if source.1 == Role::Tank && target.1.is_boss() {
                        self.add(&source, &target, EdgeKind::Taunt, params.taunt_amount);
                    } else {
                        self.discarded += 1;
                    }
                }
                _ => {}
            }
        }
    }

    fn infer(&mut self) {
        let episode = self.episode;
        let params = self.params;
        let boss = self.boss();
        let party = self.party_nodes();
        let boss_targets = self.boss_attack_shares(&party);
        let heal_targets = self.heal_distribution(&party);

        let mut boss_attacks = 0usize;
        let mut party_damage: BTreeMap<Node, f64> = BTreeMap::new();

        for action in episode.actions.iter().filter(|a| a.is_triggered()) {
            let source = self.node(&action.agent_id);
            match (&action.branch, source.1) {
                (Branch::Attack, Role::Boss) => {
                    boss_attacks += 1;
                    for (target, share) in &boss_targets {
                        self.add(&boss, target, EdgeKind::Damage, params.boss_damage * share);
                    }
                }
                (Branch::Attack, role) => {
                    let damage = params.damage_for(role);
                    self.add(&source, &boss, EdgeKind::Damage, damage);
                    self.add(&source, &boss, EdgeKind::Threat, params.attack_threat(role));
                    *party_damage.entry(source).or_insert(0.0) += damage;
                }
                (Branch::Heal, Role::Healer) => {
                    for (target, fraction) in &heal_targets {
                        self.add(&source, target, EdgeKind::Heal, params.heal_amount * fraction);
                    }
                    self.add(&source, &boss, EdgeKind::Threat, params.heal_threat);
                }
                (Branch::ThreatBoost, Role::Tank) => {
                    self.add(&source, &boss, EdgeKind::Threat, params.threat_boost_threat);
                }
                (Branch::Taunt, Role::Tank) => {
                    self.add(&source, &boss, EdgeKind::Taunt, params.taunt_amount);
                }
                _ => {}
            }
        }

        if params.boss_retaliation && boss_attacks == 0 && !party_damage.is_empty() {
            self.retaliate(&party_damage);
        }
    }

    /// Distinct non-boss nodes: roster members plus agents acting in the episode.
    fn party_nodes(&self) -> Vec<Node> {
        let roster = self.episode.roster.party();
        let acting = self
            .episode
            .actions
            .iter()
            .map(|a| (a.agent_id.as_str(), self.episode.role_of(&a.agent_id)))
            .filter(|(_, role)| !role.is_boss());

        let mut nodes: Vec<Node> = Vec::new();
        for (agent_id, role) in roster.chain(acting) {
            let node = (self.node_for(agent_id, role), role);
            if !nodes.contains(&node) {
                nodes.push(node);
            }
        }
        nodes
    }

    /// Share of one boss attack per party node: the Tank share split over tank
    /// nodes, the remainder evenly over the rest, renormalized when either
    /// side is missing.
    fn boss_attack_shares(&self, party: &[Node]) -> Vec<(Node, f64)> {
        let tanks = party.iter().filter(|(_, role)| *role == Role::Tank).count();
        let others = party.len() - tanks;
        let (tank_share, other_share) = match (tanks, others) {
            (0, 0) => return Vec::new(),
            (_, 0) => (1.0, 0.0),
            (0, _) => (0.0, 1.0),
            _ => (self.params.tank_aggro_share, 1.0 - self.params.tank_aggro_share),
        };

        party
            .iter()
            .map(|node| {
                let share = if node.1 == Role::Tank {
                    tank_share / tanks as f64
                } else {
                    other_share / others as f64
                };
                (node.clone(), share)
            })
            .filter(|(_, share)| *share > 0.0)
            .collect()
    }

    /// Heal fractions per target node.
    ///
    /// Role nodes always receive their split. Agent nodes share their role's
    /// fraction evenly; a role with no agent present falls back to the role label.
    fn heal_distribution(&self, party: &[Node]) -> Vec<(Node, f64)> {
        let mut out = Vec::new();
        for (role, fraction) in self.params.heal_targets() {
            let members: Vec<&Node> = match self.granularity {
                Granularity::Role => Vec::new(),
                Granularity::Agent => party.iter().filter(|(_, r)| *r == role).collect(),
            };
            if members.is_empty() {
                out.push(((role.as_str().to_string(), role), fraction));
            } else {
                let each = fraction / members.len() as f64;
                out.extend(members.into_iter().map(|node| (node.clone(), each)));
            }
        }
        out
    }

    /// Boss damage modeled from party damage when no boss attack was recorded.
    fn retaliate(&mut self, party_damage: &BTreeMap<Node, f64>) {
        let params = self.params;
        let boss = self.boss();
        let non_tank = party_damage
            .keys()
            .filter(|(_, role)| *role != Role::Tank)
            .count()
            .max(1);

        for (node, damage) in party_damage {
            let share = if node.1 == Role::Tank {
                params.tank_aggro_share
            } else {
                (1.0 - params.tank_aggro_share) / non_tank as f64
            };
            self.add(&boss, node, EdgeKind::Damage, damage * params.boss_retaliation_ratio * share);
        }
    }
}
