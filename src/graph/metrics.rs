//! Node-level centrality metrics.
//!
//! Strength uses the directed interaction edges. Degree, betweenness and
//! closeness use the unweighted undirected projection; continuity links
//! (when given) only join that projection.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{ContinuityLink, InteractionGraph};
use crate::episode::Role;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMetrics {
    pub node: String,
    pub role: Role,
    pub out_strength: f64,
    pub in_strength: f64,
    pub strength: f64,
    pub degree: f64,
    pub betweenness: f64,
    pub closeness: f64,
}

/// Metrics for every node of `graph`, in node order.
pub fn compute_metrics(graph: &InteractionGraph) -> Vec<NodeMetrics> {
    compute_with_links(graph, &[])
}

/// Metrics with extra undirected links joining the projection.
pub fn compute_with_links(graph: &InteractionGraph, links: &[ContinuityLink]) -> Vec<NodeMetrics> {
    let ids: Vec<&str> = graph.nodes().map(|(id, _)| id).collect();
    let index: BTreeMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let n = ids.len();

    let mut out_strength = vec![0.0; n];
    let mut in_strength = vec![0.0; n];
    let mut neighbors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];

    for (source, target, _, weight) in graph.weighted_edges() {
        let (Some(&s), Some(&t)) = (index.get(source), index.get(target)) else {
            continue;
        };
        out_strength[s] += weight;
        in_strength[t] += weight;
        connect(&mut neighbors, s, t);
    }
    for link in links {
        if let (Some(&s), Some(&t)) = (index.get(link.source.as_str()), index.get(link.target.as_str())) {
            connect(&mut neighbors, s, t);
        }
    }

    let betweenness = betweenness_centrality(&neighbors);

    graph
        .nodes()
        .enumerate()
        .map(|(i, (id, role))| NodeMetrics {
            node: id.to_string(),
            role,
            out_strength: out_strength[i],
            in_strength: in_strength[i],
            strength: out_strength[i] + in_strength[i],
            degree: degree_centrality(neighbors[i].len(), n),
            betweenness: betweenness[i],
            closeness: closeness_centrality(&neighbors, i),
        })
        .collect()
}

fn connect(neighbors: &mut [BTreeSet<usize>], a: usize, b: usize) {
    if a != b {
        neighbors[a].insert(b);
        neighbors[b].insert(a);
    }
}

/// deg / (n - 1); 0 for graphs with at most one node.
fn degree_centrality(degree: usize, n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    degree as f64 / (n - 1) as f64
}

/// Brandes betweenness on an unweighted undirected graph, normalized by
/// 2 / ((n-1)(n-2)).
fn betweenness_centrality(neighbors: &[BTreeSet<usize>]) -> Vec<f64> {
    let n = neighbors.len();
    let mut centrality = vec![0.0; n];
    if n <= 2 {
        return centrality;
    }

    for s in 0..n {
        let mut stack = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut distance: Vec<Option<usize>> = vec![None; n];
        sigma[s] = 1.0;
        distance[s] = Some(0);

        let mut queue = VecDeque::new();
        queue.push_back(s);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            let dv = distance[v].unwrap_or(0);
            for &w in &neighbors[v] {
                if distance[w].is_none() {
                    distance[w] = Some(dv + 1);
                    queue.push_back(w);
                }
                if distance[w] == Some(dv + 1) {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    // Each undirected pair was counted from both ends
    let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
    centrality.iter_mut().for_each(|c| *c *= scale);
    centrality
}

/// Closeness with Wasserman-Faust scaling: (r / total distance) * (r / (n-1))
/// over the r nodes reachable from `node`; 0 when nothing is reachable.
fn closeness_centrality(neighbors: &[BTreeSet<usize>], node: usize) -> f64 {
    let n = neighbors.len();
    if n <= 1 {
        return 0.0;
    }

    let mut distance: Vec<Option<usize>> = vec![None; n];
    distance[node] = Some(0);
    let mut queue = VecDeque::from([node]);
    let mut total = 0usize;
    let mut reachable = 0usize;

    while let Some(v) = queue.pop_front() {
        let dv = distance[v].unwrap_or(0);
        for &w in &neighbors[v] {
            if distance[w].is_none() {
                distance[w] = Some(dv + 1);
                total += dv + 1;
                reachable += 1;
                queue.push_back(w);
            }
        }
    }

    if total == 0 {
        return 0.0;
    }
    let r = reachable as f64;
    (r / total as f64) * (r / (n - 1) as f64)
}

/// Top `n` nodes by `key`, highest first; ties keep node order.
pub fn top_by<F>(metrics: &[NodeMetrics], n: usize, key: F) -> Vec<&NodeMetrics>
where
    F: Fn(&NodeMetrics) -> f64,
{
    let mut ranked: Vec<&NodeMetrics> = metrics.iter().collect();
    ranked.sort_by(|a, b| key(b).total_cmp(&key(a)));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeKind;

    fn find<'a>(metrics: &'a [NodeMetrics], node: &str) -> &'a NodeMetrics {
        metrics.iter().find(|m| m.node == node).unwrap()
    }

    /// Star: Boss in the middle, three party roles around it.
    fn star() -> InteractionGraph {
        let mut graph = InteractionGraph::new();
        graph.add_edge(("Tank", Role::Tank), ("Boss", Role::Boss), EdgeKind::Damage, 2.0, 1);
        graph.add_edge(("MeleeDPS", Role::MeleeDps), ("Boss", Role::Boss), EdgeKind::Damage, 10.0, 1);
        graph.add_edge(("Boss", Role::Boss), ("Healer", Role::Healer), EdgeKind::Damage, 20.0, 1);
        graph.add_edge(("Tank", Role::Tank), ("Boss", Role::Boss), EdgeKind::Threat, 2.0, 1);
        graph
    }

    #[test]
    fn test_strength() {
        let metrics = compute_metrics(&star());
        let boss = find(&metrics, "Boss");
        assert_eq!(boss.in_strength, 14.0);
        assert_eq!(boss.out_strength, 20.0);
        assert_eq!(boss.strength, 34.0);
        assert_eq!(find(&metrics, "Tank").out_strength, 4.0);
    }

    #[test]
    fn test_star_centrality() {
        let metrics = compute_metrics(&star());
        let boss = find(&metrics, "Boss");
        assert_eq!(boss.degree, 1.0);
        assert!((boss.betweenness - 1.0).abs() < 1e-9);
        assert!((boss.closeness - 1.0).abs() < 1e-9);

        let tank = find(&metrics, "Tank");
        assert!((tank.degree - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(tank.betweenness, 0.0);
        // distances 1, 2, 2 → 3/5
        assert!((tank.closeness - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_single_node_graph_is_all_zero() {
        let mut graph = InteractionGraph::new();
        graph.add_node("Boss", Role::Boss);
        let metrics = compute_metrics(&graph);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].degree, 0.0);
        assert_eq!(metrics[0].betweenness, 0.0);
        assert_eq!(metrics[0].closeness, 0.0);
    }

    #[test]
    fn test_disconnected_closeness_scaled() {
        let mut graph = InteractionGraph::new();
        graph.add_edge(("Tank", Role::Tank), ("Boss", Role::Boss), EdgeKind::Damage, 1.0, 1);
        graph.add_node("Healer", Role::Healer);
        let metrics = compute_metrics(&graph);
        // One reachable node at distance 1 out of two others
        assert!((find(&metrics, "Tank").closeness - 0.5).abs() < 1e-9);
        assert_eq!(find(&metrics, "Healer").closeness, 0.0);
    }

    #[test]
    fn test_links_join_projection_only() {
        let mut graph = InteractionGraph::new();
        graph.add_node("Tank_early", Role::Tank);
        graph.add_node("Tank_late", Role::Tank);
        let links = vec![ContinuityLink {
            source: "Tank_early".to_string(),
            target: "Tank_late".to_string(),
            role: Role::Tank,
            weight: 1.0,
        }];
        let metrics = compute_with_links(&graph, &links);
        assert_eq!(metrics[0].degree, 1.0);
        assert_eq!(metrics[0].strength, 0.0);
    }

    #[test]
    fn test_top_by() {
        let metrics = compute_metrics(&star());
        let top = top_by(&metrics, 2, |m| m.strength);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].node, "Boss");
        assert_eq!(top[1].node, "Healer");
    }
}
