use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::percentage;
use crate::episode::{Branch, Episode, Role};

/// Win condition recorded when the party defeats the boss.
pub const PARTY_WIN: &str = "party";

/// Per-class performance over a batch of episodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassStats {
    pub episodes: usize,
    pub wins: usize,
    pub attacks: usize,
    pub heals: usize,
    pub threat_boosts: usize,
}

impl ClassStats {
    /// Win percentage, 0 for a class with no episodes.
    pub fn win_rate(&self) -> f64 {
        percentage(self.wins, self.episodes)
    }
}

/// Per-role stats for every non-boss role present in `episodes`.
pub fn class_performance(episodes: &[Episode]) -> BTreeMap<Role, ClassStats> {
    let mut stats: BTreeMap<Role, ClassStats> = BTreeMap::new();

    for episode in episodes {
        let party_won = episode.win_condition == PARTY_WIN;
        let present: BTreeSet<Role> = episode.roster.party().map(|(_, role)| role).collect();
        for role in present {
            let entry = stats.entry(role).or_default();
            entry.episodes += 1;
            if party_won {
                entry.wins += 1;
            }
        }

        for action in episode.actions.iter().filter(|a| a.is_triggered()) {
            let role = episode.role_of(&action.agent_id);
            if role.is_boss() {
                continue;
            }
            let entry = stats.entry(role).or_default();
            match action.branch {
                Branch::Attack => entry.attacks += 1,
                Branch::Heal => entry.heals += 1,
                Branch::ThreatBoost => entry.threat_boosts += 1,
                _ => {}
            }
        }
    }

    stats
}
