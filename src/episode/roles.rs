//! Role derivation and the per-episode agent roster.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Game class of an agent for one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Boss,
    Tank,
    Healer,
    #[serde(rename = "MeleeDPS")]
    MeleeDps,
    #[serde(rename = "RangedDPS")]
    RangedDps,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Boss,
        Role::Tank,
        Role::Healer,
        Role::MeleeDps,
        Role::RangedDps,
    ];

    /// Every role except the boss.
    pub const PARTY: [Role; 4] = [Role::Tank, Role::Healer, Role::MeleeDps, Role::RangedDps];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Boss => "Boss",
            Role::Tank => "Tank",
            Role::Healer => "Healer",
            Role::MeleeDps => "MeleeDPS",
            Role::RangedDps => "RangedDPS",
        }
    }

    pub fn is_boss(&self) -> bool {
        matches!(self, Role::Boss)
    }

    /// Parse an explicit class label such as `"MeleeDPS"` or `"ranged_dps"`.
    ///
    /// Case, spaces, underscores and hyphens are ignored. Labels that name no
    /// playable class (e.g. `"None"`) return `None`.
    pub fn from_label(label: &str) -> Option<Role> {
        let normalized: String = label
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "boss" => Some(Role::Boss),
            "tank" => Some(Role::Tank),
            "healer" => Some(Role::Healer),
            "meleedps" | "melee" => Some(Role::MeleeDps),
            "rangeddps" | "ranged" => Some(Role::RangedDps),
            _ => None,
        }
    }

    /// Infer a role from substrings of an agent identifier.
    ///
    /// Precedence: boss > tank (or "party member 1") > healer >
    /// melee (or "party member 2".."4") > RangedDPS.
    pub fn infer_from_id(agent_id: &str) -> Role {
        let lower = agent_id.to_lowercase();
        let member = party_member_number(&lower);

        if lower.contains("boss") {
            Role::Boss
        } else if lower.contains("tank") || member == Some(1) {
            Role::Tank
        } else if lower.contains("healer") {
            Role::Healer
        } else if lower.contains("melee") || matches!(member, Some(2..=4)) {
            Role::MeleeDps
        } else {
            Role::RangedDps
        }
    }

    /// Class chosen by a `class_selection` value (0=Tank, 1=Healer, 2=RangedDPS, 3=MeleeDPS).
    pub fn from_class_index(index: i64) -> Option<Role> {
        match index {
            0 => Some(Role::Tank),
            1 => Some(Role::Healer),
            2 => Some(Role::RangedDps),
            3 => Some(Role::MeleeDps),
            _ => None,
        }
    }
}

/// Number in identifiers like "Party Member 3".
fn party_member_number(lower_id: &str) -> Option<u32> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"party\s*member\s*(\d+)\b").expect("Invalid regex pattern"));
    pattern
        .captures(lower_id)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_label(s).ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// Canonical agent id → role mapping for one episode.
///
/// Built once at load time from whichever class encoding the episode used
/// (`agentClasses` object or `agentIds` + `agentClassValues` lists).
/// Keeps first-seen order so "the first boss" is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Roster {
    entries: Vec<(String, Role)>,
}

impl Roster {
    /// Build from (agent id, optional class label) pairs.
    ///
    /// A missing or unrecognized label falls back to [`Role::infer_from_id`].
    /// A repeated id keeps its first position and takes the later label.
    pub fn from_labels<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<String>)>,
        S: Into<String>,
    {
        let mut roster = Roster::default();
        for (agent_id, label) in pairs {
            let agent_id = agent_id.into();
            let role = label
                .as_deref()
                .and_then(Role::from_label)
                .unwrap_or_else(|| Role::infer_from_id(&agent_id));
            roster.insert(agent_id, role);
        }
        roster
    }

    pub fn insert(&mut self, agent_id: String, role: Role) {
        match self.entries.iter_mut().find(|(id, _)| *id == agent_id) {
            Some(entry) => entry.1 = role,
            None => self.entries.push((agent_id, role)),
        }
    }

    /// Role of an agent; agents missing from the roster are inferred from their id.
    pub fn role_of(&self, agent_id: &str) -> Role {
        self.entries
            .iter()
            .find(|(id, _)| id == agent_id)
            .map(|(_, role)| *role)
            .unwrap_or_else(|| Role::infer_from_id(agent_id))
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.entries.iter().any(|(id, _)| id == agent_id)
    }

    /// First boss agent in the roster.
    pub fn boss_id(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, role)| role.is_boss())
            .map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Role)> {
        self.entries.iter().map(|(id, role)| (id.as_str(), *role))
    }

    /// Non-boss agents.
    pub fn party(&self) -> impl Iterator<Item = (&str, Role)> {
        self.iter().filter(|(_, role)| !role.is_boss())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_normalization() {
        assert_eq!(Role::from_label("MeleeDPS"), Some(Role::MeleeDps));
        assert_eq!(Role::from_label("ranged_dps"), Some(Role::RangedDps));
        assert_eq!(Role::from_label("Melee DPS"), Some(Role::MeleeDps));
        assert_eq!(Role::from_label("BOSS"), Some(Role::Boss));
        assert_eq!(Role::from_label("None"), None);
        assert_eq!(Role::from_label(""), None);
    }

    #[test]
    fn test_infer_precedence() {
        // boss wins over every other substring
        assert_eq!(Role::infer_from_id("tank_boss"), Role::Boss);
        assert_eq!(Role::infer_from_id("Tank-healer"), Role::Tank);
        assert_eq!(Role::infer_from_id("HealerBot"), Role::Healer);
        assert_eq!(Role::infer_from_id("healer_melee"), Role::Healer);
        assert_eq!(Role::infer_from_id("melee_1"), Role::MeleeDps);
        assert_eq!(Role::infer_from_id("party_0"), Role::RangedDps);
    }

    #[test]
    fn test_infer_party_member_numbers() {
        assert_eq!(Role::infer_from_id("Party Member 1"), Role::Tank);
        assert_eq!(Role::infer_from_id("Party Member 3"), Role::MeleeDps);
        assert_eq!(Role::infer_from_id("Party Member 5"), Role::RangedDps);
        // "10" is not member 1
        assert_eq!(Role::infer_from_id("Party Member 10"), Role::RangedDps);
    }

    #[test]
    fn test_class_index() {
        assert_eq!(Role::from_class_index(0), Some(Role::Tank));
        assert_eq!(Role::from_class_index(3), Some(Role::MeleeDps));
        assert_eq!(Role::from_class_index(4), None);
        assert_eq!(Role::from_class_index(-1), None);
    }

    #[test]
    fn test_roster_label_then_inference() {
        let roster = Roster::from_labels(vec![
            ("Agent A", Some("Healer".to_string())),
            ("Boss", None),
            ("Party Member 1", Some("None".to_string())),
        ]);
        assert_eq!(roster.role_of("Agent A"), Role::Healer);
        assert_eq!(roster.role_of("Boss"), Role::Boss);
        assert_eq!(roster.role_of("Party Member 1"), Role::Tank);
        // Unknown agents are inferred on the fly
        assert_eq!(roster.role_of("melee_x"), Role::MeleeDps);
        assert_eq!(roster.boss_id(), Some("Boss"));
        assert_eq!(roster.party().count(), 2);
    }

    #[test]
    fn test_roster_duplicate_keeps_position() {
        let roster = Roster::from_labels(vec![
            ("a", Some("Tank".to_string())),
            ("b", Some("Healer".to_string())),
            ("a", Some("MeleeDPS".to_string())),
        ]);
        assert_eq!(roster.len(), 2);
        let ids: Vec<_> = roster.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(roster.role_of("a"), Role::MeleeDps);
    }

    #[test]
    fn test_role_serde_names() {
        let json = serde_json::to_string(&Role::MeleeDps).unwrap();
        assert_eq!(json, "\"MeleeDPS\"");
        let role: Role = serde_json::from_str("\"RangedDPS\"").unwrap();
        assert_eq!(role, Role::RangedDps);
        assert_eq!("healer".parse::<Role>().unwrap(), Role::Healer);
    }
}
