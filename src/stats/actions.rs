use serde::Serialize;
use std::collections::BTreeMap;

use super::percentage;
use crate::config::InferenceParams;
use crate::episode::{Action, Branch, Episode};

/// Recorded-vs-real action counts for one episode.
#[derive(Debug, Clone, Serialize)]
pub struct ActionAudit {
    pub episode: i64,
    pub duration: f64,
    pub win_condition: String,
    pub total: usize,
    pub non_zero: usize,
    /// Non-zero actions minus "no selection" class selections.
    pub real: usize,
    pub zero: usize,
    pub percent_real: f64,
    /// First real actions in recording order.
    pub sample: Vec<Action>,
    /// Real action counts per agent, then per branch.
    pub by_agent: BTreeMap<String, BTreeMap<String, usize>>,
}

impl ActionAudit {
    pub fn has_real_actions(&self) -> bool {
        self.real > 0
    }
}

/// A non-zero action that is not a "no selection" class selection.
pub fn is_real_action(action: &Action, params: &InferenceParams) -> bool {
    action.is_non_zero()
        && !(action.branch == Branch::ClassSelection && params.is_no_selection(action.value))
}

pub fn audit_actions(episode: &Episode, params: &InferenceParams, sample_size: usize) -> ActionAudit {
    let total = episode.actions.len();
    let non_zero = episode.actions.iter().filter(|a| a.is_non_zero()).count();
    let real: Vec<&Action> = episode
        .actions
        .iter()
        .filter(|a| is_real_action(a, params))
        .collect();

    let mut by_agent: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for action in &real {
        *by_agent
            .entry(action.agent_id.clone())
            .or_default()
            .entry(action.branch.to_string())
            .or_insert(0) += 1;
    }

    ActionAudit {
        episode: episode.episode,
        duration: episode.duration,
        win_condition: episode.win_condition.clone(),
        total,
        non_zero,
        real: real.len(),
        zero: total - non_zero,
        percent_real: percentage(real.len(), total),
        sample: real.iter().take(sample_size).map(|a| (*a).clone()).collect(),
        by_agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(agent: &str, branch: Branch, value: f64) -> Action {
        Action {
            frame: 0,
            agent_id: agent.to_string(),
            branch,
            value,
            target_id: None,
        }
    }

    fn sample_episode() -> Episode {
        Episode {
            episode: 9,
            actions: vec![
                action("a", Branch::ClassSelection, 4.0),
                action("a", Branch::ClassSelection, -1.0),
                action("a", Branch::ClassSelection, 0.0),
                action("b", Branch::ClassSelection, 2.0),
                action("a", Branch::Attack, 1.0),
                action("a", Branch::Attack, 1.0),
                action("b", Branch::Movement, -0.5),
                action("b", Branch::Heal, 0.0),
            ],
            ..Episode::default()
        }
    }

    #[test]
    fn test_audit_counts() {
        let audit = audit_actions(&sample_episode(), &InferenceParams::default(), 30);
        assert_eq!(audit.total, 8);
        assert_eq!(audit.non_zero, 6);
        assert_eq!(audit.zero, 2);
        // 4 and -1 are not real selections
        assert_eq!(audit.real, 4);
        assert_eq!(audit.percent_real, 50.0);
        assert_eq!(audit.by_agent["a"]["attack"], 2);
        assert_eq!(audit.by_agent["b"]["class_selection"], 1);
        assert_eq!(audit.by_agent["b"]["movement"], 1);
    }

    #[test]
    fn test_real_subset_of_non_zero() {
        let params = InferenceParams::default();
        let episode = sample_episode();
        let invalid_selections = episode
            .actions
            .iter()
            .filter(|a| a.is_non_zero() && a.branch == Branch::ClassSelection && params.is_no_selection(a.value))
            .count();
        let audit = audit_actions(&episode, &params, 30);
        assert!(audit.real <= audit.non_zero && audit.non_zero <= audit.total);
        assert_eq!(audit.real, audit.non_zero - invalid_selections);
        assert!(episode
            .actions
            .iter()
            .filter(|a| is_real_action(a, &params))
            .all(|a| a.is_non_zero()));
    }

    #[test]
    fn test_sample_is_truncated() {
        let audit = audit_actions(&sample_episode(), &InferenceParams::default(), 2);
        assert_eq!(audit.sample.len(), 2);
        assert_eq!(audit.sample[0].branch, Branch::ClassSelection);
        assert_eq!(audit.sample[0].agent_id, "b");
    }

    #[test]
    fn test_empty_episode_has_zero_rate() {
        let audit = audit_actions(&Episode::default(), &InferenceParams::default(), 30);
        assert_eq!(audit.total, 0);
        assert_eq!(audit.percent_real, 0.0);
        assert!(!audit.has_real_actions());
    }
}
