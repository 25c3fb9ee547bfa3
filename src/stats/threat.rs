use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::InferenceParams;
use crate::episode::{Branch, Episode, Role};

/// Threat generated by one agent across a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreatEntry {
    pub agent: String,
    pub role: Role,
    pub attacks: usize,
    pub heals: usize,
    pub threat_boosts: usize,
    pub threat: f64,
}

/// Threat per party agent and role played, highest first.
///
/// Attacks add the role's attack threat; heals (Healer only) and threat
/// boosts (Tank only) add their fixed threat. An agent that played several
/// classes gets one row per class.
pub fn threat_table(episodes: &[Episode], params: &InferenceParams) -> Vec<ThreatEntry> {
    let mut table: BTreeMap<(String, Role), ThreatEntry> = BTreeMap::new();

    for episode in episodes {
        for action in episode.actions.iter().filter(|a| a.is_triggered()) {
            let role = episode.role_of(&action.agent_id);
            let threat = match (&action.branch, role) {
                (_, Role::Boss) => continue,
                (Branch::Attack, role) => params.attack_threat(role),
                (Branch::Heal, Role::Healer) => params.heal_threat,
                (Branch::ThreatBoost, Role::Tank) => params.threat_boost_threat,
                _ => continue,
            };

            let entry = table
                .entry((action.agent_id.clone(), role))
                .or_insert_with(|| ThreatEntry {
                    agent: action.agent_id.clone(),
                    role,
                    attacks: 0,
                    heals: 0,
                    threat_boosts: 0,
                    threat: 0.0,
                });
            match action.branch {
                Branch::Attack => entry.attacks += 1,
                Branch::Heal => entry.heals += 1,
                _ => entry.threat_boosts += 1,
            }
            entry.threat += threat;
        }
    }

    let mut rows: Vec<ThreatEntry> = table.into_values().collect();
    rows.sort_by(|a, b| b.threat.total_cmp(&a.threat));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{Action, Roster};

    fn action(agent: &str, branch: Branch) -> Action {
        Action {
            frame: 0,
            agent_id: agent.to_string(),
            branch,
            value: 1.0,
            target_id: None,
        }
    }

    #[test]
    fn test_threat_table() {
        let episode = Episode {
            roster: Roster::from_labels(vec![
                ("boss", Some("Boss".to_string())),
                ("tank", Some("Tank".to_string())),
                ("healer", Some("Healer".to_string())),
                ("melee", Some("MeleeDPS".to_string())),
            ]),
            actions: vec![
                action("tank", Branch::Attack),
                action("tank", Branch::ThreatBoost),
                action("healer", Branch::Heal),
                action("melee", Branch::Attack),
                action("melee", Branch::Heal),
                action("boss", Branch::Attack),
            ],
            ..Episode::default()
        };
        let table = threat_table(&[episode], &InferenceParams::default());

        assert_eq!(table.len(), 3);
        assert_eq!(table[0].agent, "tank");
        assert_eq!(table[0].threat, 27.0);
        assert_eq!(table[0].threat_boosts, 1);
        assert_eq!(table[1].agent, "healer");
        assert_eq!(table[1].threat, 15.0);
        // A melee "heal" is not a heal
        assert_eq!(table[2].threat, 10.0);
        assert_eq!(table[2].heals, 0);
    }

    #[test]
    fn test_threat_rows_follow_role_per_episode() {
        let as_tank = Episode {
            episode: 1,
            roster: Roster::from_labels(vec![("party_0", Some("Tank".to_string()))]),
            actions: vec![action("party_0", Branch::ThreatBoost)],
            ..Episode::default()
        };
        let as_healer = Episode {
            episode: 2,
            roster: Roster::from_labels(vec![("party_0", Some("Healer".to_string()))]),
            actions: vec![action("party_0", Branch::Heal)],
            ..Episode::default()
        };
        let params = InferenceParams::default();
        let forward = threat_table(&[as_tank.clone(), as_healer.clone()], &params);
        let reversed = threat_table(&[as_healer, as_tank], &params);

        assert_eq!(forward, reversed);
        assert_eq!(forward.len(), 2);
        assert_eq!((forward[0].role, forward[0].threat), (Role::Tank, 25.0));
        assert_eq!((forward[1].role, forward[1].threat), (Role::Healer, 15.0));
    }
}
