use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::episode::Role;
use crate::error::SnaError;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RAIDSNA_CONFIG";

/// Config file picked up from the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "raidsna.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub inference: InferenceParams,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Constants driving edge inference.
///
/// Defaults follow the simulation's class damage values and threat rules.
/// `tank_aggro_share` approximates the aggro table when the boss target is
/// not recorded.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceParams {
    pub melee_damage: f64,
    pub ranged_damage: f64,
    pub tank_damage: f64,
    pub healer_damage: f64,
    /// Modeled damage of a single boss attack.
    pub boss_damage: f64,
    /// Fraction of boss damage taken by the Tank; the rest is split evenly.
    pub tank_aggro_share: f64,
    pub heal_amount: f64,
    pub heal_split: HealSplit,
    pub attack_threat_multiplier: f64,
    pub heal_threat: f64,
    pub threat_boost_threat: f64,
    pub taunt_amount: f64,
    /// Taunt derived from Tank→Boss damage when no taunt data exists.
    pub taunt_from_damage_ratio: f64,
    pub min_edge_weight: f64,
    /// class_selection value meaning "nothing selected" (besides -1).
    pub no_selection_sentinel: i64,
    pub boss_retaliation: bool,
    pub boss_retaliation_ratio: f64,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            melee_damage: 10.0,
            ranged_damage: 5.0,
            tank_damage: 2.0,
            healer_damage: 2.0,
            boss_damage: 100.0,
            tank_aggro_share: 0.6,
            heal_amount: 10.0,
            heal_split: HealSplit::default(),
            attack_threat_multiplier: 1.0,
            heal_threat: 15.0,
            threat_boost_threat: 25.0,
            taunt_amount: 1.0,
            taunt_from_damage_ratio: 0.5,
            min_edge_weight: 1e-3,
            no_selection_sentinel: 4,
            boss_retaliation: false,
            boss_retaliation_ratio: 0.1,
        }
    }
}

/// How an unobserved heal is spread over the party.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealSplit {
    pub tank: f64,
    pub melee: f64,
    pub ranged: f64,
}

impl Default for HealSplit {
    fn default() -> Self {
        Self {
            tank: 0.5,
            melee: 0.3,
            ranged: 0.2,
        }
    }
}

impl InferenceParams {
    /// Damage credited to one attack by an agent of `role`.
    pub fn damage_for(&self, role: Role) -> f64 {
        match role {
            Role::Boss => self.boss_damage,
            Role::Tank => self.tank_damage,
            Role::Healer => self.healer_damage,
            Role::MeleeDps => self.melee_damage,
            Role::RangedDps => self.ranged_damage,
        }
    }

    /// Threat generated toward the boss by one attack.
    pub fn attack_threat(&self, role: Role) -> f64 {
        self.damage_for(role) * self.attack_threat_multiplier
    }

    /// Heal split as (role, fraction) pairs, in priority order.
    pub fn heal_targets(&self) -> [(Role, f64); 3] {
        [
            (Role::Tank, self.heal_split.tank),
            (Role::MeleeDps, self.heal_split.melee),
            (Role::RangedDps, self.heal_split.ranged),
        ]
    }

    /// True for class_selection values that do not represent a choice.
    pub fn is_no_selection(&self, value: f64) -> bool {
        value == -1.0 || value == self.no_selection_sentinel as f64
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |message: String| -> crate::error::Result<()> { Err(SnaError::Config(message)) };

        let constants = [
            ("melee_damage", self.melee_damage),
            ("ranged_damage", self.ranged_damage),
            ("tank_damage", self.tank_damage),
            ("healer_damage", self.healer_damage),
            ("boss_damage", self.boss_damage),
            ("heal_amount", self.heal_amount),
            ("attack_threat_multiplier", self.attack_threat_multiplier),
            ("heal_threat", self.heal_threat),
            ("threat_boost_threat", self.threat_boost_threat),
            ("taunt_amount", self.taunt_amount),
            ("taunt_from_damage_ratio", self.taunt_from_damage_ratio),
            ("boss_retaliation_ratio", self.boss_retaliation_ratio),
        ];
        for (name, value) in constants {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("inference.{} must be a non-negative number, got {}", name, value));
            }
        }

        if !(0.0..=1.0).contains(&self.tank_aggro_share) {
            return invalid("inference.tank_aggro_share must be between 0.0 and 1.0".to_string());
        }

        let split = &self.heal_split;
        if [split.tank, split.melee, split.ranged]
            .iter()
            .any(|s| !s.is_finite() || *s < 0.0)
        {
            return invalid("inference.heal_split fractions must be finite and non-negative".to_string());
        }
        let total = split.tank + split.melee + split.ranged;
        if (total - 1.0).abs() > 1e-6 {
            return invalid(format!("inference.heal_split must sum to 1.0, got {:.4}", total));
        }

        if !(self.min_edge_weight.is_finite() && self.min_edge_weight > 0.0) {
            return invalid("inference.min_edge_weight must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Console report settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Rows shown in ranked tables (centrality, threat).
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Real actions echoed by the action audit.
    #[serde(default = "default_sample_actions")]
    pub sample_actions: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            sample_actions: default_sample_actions(),
        }
    }
}

fn default_top_n() -> usize {
    5
}

fn default_sample_actions() -> usize {
    30
}

impl Config {
    /// Load configuration.
    ///
    /// Loads environment variables from .env file (if present) first, then looks
    /// for a config file in this order:
    /// 1. `explicit` (the `--config` flag)
    /// 2. Path in the RAIDSNA_CONFIG environment variable
    /// 3. ./raidsna.toml in the current directory
    ///
    /// Without any file the built-in defaults are used. A file that was asked
    /// for explicitly must exist.
    pub fn load_from(explicit: Option<&Path>) -> Result<Self> {
        let _ = dotenv::dotenv();

        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let config_path = match requested {
            Some(path) => path,
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !local.is_file() {
                    log::debug!("No {} found, using default inference parameters", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                local
            }
        };

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;
        log::info!("Configuration loaded from {}", config_path.display());

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        self.inference.validate()?;

        if self.report.top_n == 0 {
            anyhow::bail!("report.top_n must be greater than 0");
        }

        Ok(())
    }
}
