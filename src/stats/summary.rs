use serde::Serialize;
use std::collections::BTreeMap;

use super::percentage;
use crate::config::InferenceParams;
use crate::episode::{Branch, Episode, Role};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

/// Batch-level overview of a set of episodes.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub episodes: usize,
    pub win_conditions: BTreeMap<String, usize>,
    pub duration: Option<DurationStats>,
    /// Party members per role, summed over episodes.
    pub class_distribution: BTreeMap<Role, usize>,
    /// Action counts per branch, most frequent first.
    pub action_distribution: Vec<(String, usize)>,
}

impl BatchSummary {
    /// (condition, count, percentage) rows, most frequent first.
    pub fn win_condition_rates(&self) -> Vec<(&str, usize, f64)> {
        let mut rows: Vec<(&str, usize, f64)> = self
            .win_conditions
            .iter()
            .map(|(condition, count)| (condition.as_str(), *count, percentage(*count, self.episodes)))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }
}

pub fn summarize(episodes: &[Episode], params: &InferenceParams) -> BatchSummary {
    let mut win_conditions: BTreeMap<String, usize> = BTreeMap::new();
    let mut class_distribution: BTreeMap<Role, usize> = BTreeMap::new();
    let mut action_counts: BTreeMap<String, usize> = BTreeMap::new();

    for episode in episodes {
        let condition = if episode.win_condition.is_empty() {
            "unknown"
        } else {
            episode.win_condition.as_str()
        };
        *win_conditions.entry(condition.to_string()).or_insert(0) += 1;

        for (_, role) in episode.roster.party() {
            *class_distribution.entry(role).or_insert(0) += 1;
        }

        for action in &episode.actions {
            // "No selection" markers are not decisions
            if action.branch == Branch::ClassSelection && params.is_no_selection(action.value) {
                continue;
            }
            *action_counts.entry(action.branch.to_string()).or_insert(0) += 1;
        }
    }

    let mut action_distribution: Vec<(String, usize)> = action_counts.into_iter().collect();
    action_distribution.sort_by(|a, b| b.1.cmp(&a.1));

    BatchSummary {
        episodes: episodes.len(),
        win_conditions,
        duration: duration_stats(episodes),
        class_distribution,
        action_distribution,
    }
}

fn duration_stats(episodes: &[Episode]) -> Option<DurationStats> {
    if episodes.is_empty() {
        return None;
    }
    let durations = episodes.iter().map(|ep| ep.duration);
    let total: f64 = durations.clone().sum();
    Some(DurationStats {
        average: total / episodes.len() as f64,
        min: durations.clone().fold(f64::INFINITY, f64::min),
        max: durations.fold(f64::NEG_INFINITY, f64::max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{Action, Roster};

    fn episode(number: i64, win: &str, duration: f64, actions: Vec<Action>) -> Episode {
        Episode {
            episode: number,
            win_condition: win.to_string(),
            duration,
            roster: Roster::from_labels(vec![
                ("Boss", Some("Boss".to_string())),
                ("Party Member 1", Some("Tank".to_string())),
                ("Party Member 2", Some("Healer".to_string())),
            ]),
            actions,
            ..Episode::default()
        }
    }

    fn action(branch: Branch, value: f64) -> Action {
        Action {
            frame: 0,
            agent_id: "Party Member 1".to_string(),
            branch,
            value,
            target_id: None,
        }
    }

    #[test]
    fn test_summary_counts() {
        let episodes = vec![
            episode(1, "party", 10.0, vec![action(Branch::Attack, 1.0), action(Branch::Attack, 0.0)]),
            episode(2, "boss", 30.0, vec![action(Branch::ClassSelection, 4.0)]),
            episode(3, "party", 20.0, vec![action(Branch::ClassSelection, 1.0), action(Branch::Heal, 1.0)]),
        ];
        let summary = summarize(&episodes, &InferenceParams::default());

        assert_eq!(summary.episodes, 3);
        assert_eq!(summary.win_conditions["party"], 2);
        let rates = summary.win_condition_rates();
        assert_eq!(rates[0].0, "party");
        assert!((rates[0].2 - 66.666).abs() < 0.01);

        let duration = summary.duration.unwrap();
        assert_eq!(duration.average, 20.0);
        assert_eq!(duration.min, 10.0);
        assert_eq!(duration.max, 30.0);

        assert_eq!(summary.class_distribution[&Role::Tank], 3);
        assert!(!summary.class_distribution.contains_key(&Role::Boss));

        // Zero-valued attacks still count as recorded; the sentinel selection does not
        assert_eq!(summary.action_distribution[0], ("attack".to_string(), 2));
        let selections = summary
            .action_distribution
            .iter()
            .find(|(branch, _)| branch == "class_selection")
            .unwrap();
        assert_eq!(selections.1, 1);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[], &InferenceParams::default());
        assert_eq!(summary.episodes, 0);
        assert!(summary.duration.is_none());
        assert!(summary.win_condition_rates().is_empty());
    }
}
