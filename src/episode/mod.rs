//! Episode records: typed actions, combat events and the normalized roster.
//!
//! Raw JSON is normalized once at deserialization time (`RawEpisode` →
//! [`Episode`]) so downstream code never branches on the class encoding.

mod loader;
mod roles;

pub use loader::{discover_episode_files, load_batch, load_episodes, parse_episodes, LoadedBatch};
pub use roles::{Role, Roster};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Action head recorded by the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Branch {
    Attack,
    Heal,
    ThreatBoost,
    Taunt,
    Movement,
    Rotation,
    ClassSelection,
    Other(String),
}

impl Branch {
    pub fn as_str(&self) -> &str {
        match self {
            Branch::Attack => "attack",
            Branch::Heal => "heal",
            Branch::ThreatBoost => "threat_boost",
            Branch::Taunt => "taunt",
            Branch::Movement => "movement",
            Branch::Rotation => "rotation",
            Branch::ClassSelection => "class_selection",
            Branch::Other(name) => name,
        }
    }
}

impl Default for Branch {
    fn default() -> Self {
        Branch::Other("unknown".to_string())
    }
}

impl From<String> for Branch {
    fn from(name: String) -> Self {
        match name.as_str() {
            "attack" => Branch::Attack,
            "heal" => Branch::Heal,
            "threat_boost" => Branch::ThreatBoost,
            "taunt" => Branch::Taunt,
            "movement" => Branch::Movement,
            "rotation" => Branch::Rotation,
            "class_selection" => Branch::ClassSelection,
            _ => Branch::Other(name),
        }
    }
}

impl From<Branch> for String {
    fn from(branch: Branch) -> Self {
        branch.as_str().to_string()
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One recorded action head value for one agent on one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default)]
    pub frame: i64,
    #[serde(default = "unknown_agent")]
    pub agent_id: String,
    #[serde(default)]
    pub branch: Branch,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

fn unknown_agent() -> String {
    "unknown".to_string()
}

impl Action {
    /// Trigger branches fire on exactly 1.
    pub fn is_triggered(&self) -> bool {
        self.value == 1.0
    }

    pub fn is_non_zero(&self) -> bool {
        self.value != 0.0
    }

    /// Explicit target, ignoring empty strings.
    pub fn target(&self) -> Option<&str> {
        self.target_id.as_deref().filter(|t| !t.is_empty())
    }
}

/// Kind of an explicit combat-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Damage,
    Heal,
    Threat,
    Taunt,
}

/// Explicit `{type, source, target, amount}` combat-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default = "unknown_agent")]
    pub source: String,
    #[serde(default = "unknown_agent")]
    pub target: String,
    #[serde(default)]
    pub amount: f64,
}

impl CombatEvent {
    /// Recognized kind; other entry types are ignored by the graph builder.
    pub fn kind(&self) -> Option<EventKind> {
        match self.event_type.to_lowercase().as_str() {
            "damage" => Some(EventKind::Damage),
            "heal" => Some(EventKind::Heal),
            "threat" => Some(EventKind::Threat),
            "taunt" => Some(EventKind::Taunt),
            _ => None,
        }
    }
}

/// A normalized episode record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawEpisode")]
pub struct Episode {
    pub episode: i64,
    pub duration: f64,
    pub win_condition: String,
    pub learning_progress: f64,
    pub roster: Roster,
    pub actions: Vec<Action>,
    /// `events`, or `combatLog` when `events` is absent or empty.
    pub events: Vec<CombatEvent>,
}

impl Episode {
    /// True when the episode carries usable explicit combat events.
    pub fn has_combat_events(&self) -> bool {
        self.events.iter().any(|ev| ev.kind().is_some())
    }

    /// True when any action names an explicit target.
    pub fn has_explicit_targets(&self) -> bool {
        self.actions.iter().any(|a| a.target().is_some())
    }

    /// Role of an agent in this episode.
    pub fn role_of(&self, agent_id: &str) -> Role {
        self.roster.role_of(agent_id)
    }
}

/// Episode JSON exactly as recorded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEpisode {
    #[serde(default)]
    episode: Option<i64>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    win_condition: Option<String>,
    #[serde(default)]
    learning_progress: Option<f64>,
    #[serde(default)]
    agent_ids: Option<Vec<String>>,
    #[serde(default)]
    agent_class_values: Option<Vec<Option<String>>>,
    #[serde(default)]
    agent_classes: Option<JsonValue>,
    #[serde(default)]
    actions: Option<Vec<Action>>,
    #[serde(default)]
    events: Option<Vec<CombatEvent>>,
    #[serde(default)]
    combat_log: Option<Vec<CombatEvent>>,
}

impl From<RawEpisode> for Episode {
    fn from(raw: RawEpisode) -> Self {
        let roster = match raw.agent_classes {
            Some(JsonValue::Object(map)) => Roster::from_labels(
                map.into_iter()
                    .map(|(id, class)| (id, class.as_str().map(str::to_string))),
            ),
            // List form (or absent): the parallel id/class arrays are authoritative
            _ => {
                let ids = raw.agent_ids.unwrap_or_default();
                let mut classes = raw.agent_class_values.unwrap_or_default().into_iter();
                Roster::from_labels(ids.into_iter().map(|id| (id, classes.next().flatten())))
            }
        };

        let events = match raw.events {
            Some(events) if !events.is_empty() => events,
            _ => raw.combat_log.unwrap_or_default(),
        };

        Episode {
            episode: raw.episode.unwrap_or(0),
            duration: raw.duration.unwrap_or(0.0),
            win_condition: raw.win_condition.unwrap_or_default(),
            learning_progress: raw.learning_progress.unwrap_or(0.0),
            roster,
            actions: raw.actions.unwrap_or_default(),
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_from_list_roster() {
        let json = r#"{
            "episode": 7,
            "duration": 12.5,
            "winCondition": "party",
            "agentIds": ["Boss", "Party Member 1", "party_2"],
            "agentClassValues": ["Boss", null, "Healer"],
            "actions": [{"frame": 1, "agentId": "party_2", "branch": "heal", "value": 1}]
        }"#;
        let ep: Episode = serde_json::from_str(json).unwrap();
        assert_eq!(ep.episode, 7);
        assert_eq!(ep.win_condition, "party");
        assert_eq!(ep.roster.len(), 3);
        assert_eq!(ep.role_of("Party Member 1"), Role::Tank);
        assert_eq!(ep.role_of("party_2"), Role::Healer);
        assert_eq!(ep.actions[0].branch, Branch::Heal);
        assert!(!ep.has_explicit_targets());
    }

    #[test]
    fn test_episode_from_object_roster() {
        let json = r#"{
            "agentClasses": {"a": "Tank", "b": "RangedDPS"},
            "agentIds": ["ignored"],
            "agentClassValues": ["Boss"]
        }"#;
        let ep: Episode = serde_json::from_str(json).unwrap();
        assert_eq!(ep.roster.len(), 2);
        assert_eq!(ep.role_of("a"), Role::Tank);
        assert!(!ep.roster.contains("ignored"));
        assert!(ep.actions.is_empty());
    }

    #[test]
    fn test_episode_list_agent_classes_defers_to_ids() {
        let json = r#"{
            "agentClasses": [],
            "agentIds": ["x"],
            "agentClassValues": ["MeleeDPS"]
        }"#;
        let ep: Episode = serde_json::from_str(json).unwrap();
        assert_eq!(ep.role_of("x"), Role::MeleeDps);
    }

    #[test]
    fn test_events_fall_back_to_combat_log() {
        let json = r#"{
            "events": [],
            "combatLog": [{"type": "Damage", "source": "Boss", "target": "t", "amount": 4}]
        }"#;
        let ep: Episode = serde_json::from_str(json).unwrap();
        assert_eq!(ep.events.len(), 1);
        assert_eq!(ep.events[0].kind(), Some(EventKind::Damage));
        assert!(ep.has_combat_events());
    }

    #[test]
    fn test_branch_round_names() {
        let action: Action = serde_json::from_str(
            r#"{"frame": 3, "agentId": "p", "branch": "dash", "value": 2, "targetId": ""}"#,
        )
        .unwrap();
        assert_eq!(action.branch, Branch::Other("dash".to_string()));
        assert_eq!(action.branch.as_str(), "dash");
        // Empty target ids count as absent
        assert_eq!(action.target(), None);
        assert!(action.is_non_zero());
        assert!(!action.is_triggered());
    }
}
