use crate::types::Region;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Invalid configuration, rejected at engine construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("parameter `{name}` must be finite")]
    NotFinite { name: &'static str },

    #[error("parameter `{name}` must not be negative (got {value})")]
    Negative { name: &'static str, value: f64 },

    #[error("parameter `{name}` must be strictly positive")]
    NotPositive { name: &'static str },

    #[error("parameter `{name}` must lie in [{lo}, {hi}] (got {value})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        lo: f64,
        hi: f64,
    },

    #[error("backoff curve `{name}`: max ({max}) is below initial ({initial})")]
    CurveMaxBelowInitial {
        name: &'static str,
        initial: f64,
        max: f64,
    },

    #[error("blowout thresholds must be ordered mild <= moderate <= severe")]
    UnorderedBlowoutThresholds,

    #[error("parameter `{name}` must be at least 1")]
    ZeroCount { name: &'static str },
}

/// Retention model coefficients: `P(continue) = sigma(base + theta . z)`,
/// clamped to `[continue_floor, 1]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Per-ms delta-ping coefficient, typically negative.
    pub theta_ping: f64,
    /// Per-second search-time coefficient, typically negative.
    pub theta_search_time: f64,
    /// Blowout-rate coefficient, typically negative.
    pub theta_blowout: f64,
    /// Win-rate coefficient, typically positive.
    pub theta_win_rate: f64,
    /// Performance coefficient, typically positive.
    pub theta_performance: f64,
    /// Base logit before experience terms.
    pub base_logit: f64,
    /// How many recent matches feed the experience averages.
    pub experience_window: usize,
    /// Hard lower bound on the continue probability; non-zero so a bad
    /// stretch cannot disconnect the whole population.
    pub continue_floor: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            theta_ping: -0.02,
            theta_search_time: -0.015,
            theta_blowout: -0.5,
            theta_win_rate: 0.8,
            theta_performance: 0.6,
            base_logit: 0.0,
            experience_window: 5,
            continue_floor: 0.3,
        }
    }
}

/// Optional per-region overrides of the ping-side matchmaking knobs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegionOverrides {
    pub max_ping: Option<f64>,
    pub delta_ping_initial: Option<f64>,
    pub delta_ping_rate: Option<f64>,
}

/// All engine knobs. Validated once at `Engine::new`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard ping ceiling in milliseconds; never relaxed by backoff.
    pub max_ping: f64,

    // Delta-ping backoff curve (ms over best ping, per search).
    pub delta_ping_initial: f64,
    pub delta_ping_rate: f64,
    pub delta_ping_max: f64,

    // Skill-similarity backoff curve (percentile half-width).
    pub skill_similarity_initial: f64,
    pub skill_similarity_rate: f64,
    pub skill_similarity_max: f64,

    // Lobby skill-disparity backoff curve (percentile range).
    pub max_skill_disparity_initial: f64,
    pub max_skill_disparity_rate: f64,
    pub max_skill_disparity_max: f64,

    // Distance-metric weights; only the ratios matter.
    pub weight_geo: f64,
    pub weight_skill: f64,
    pub weight_input: f64,
    pub weight_platform: f64,

    // Match quality score blend.
    pub quality_weight_ping: f64,
    pub quality_weight_skill_balance: f64,
    pub quality_weight_wait_time: f64,

    /// Seconds of logical time per tick.
    pub tick_interval: f64,
    /// Number of skill buckets B.
    pub num_skill_buckets: usize,
    /// Candidate cap per greedy seed.
    pub top_k_candidates: usize,

    /// Expected Poisson arrivals per tick; `None` auto-scales to 0.2% of
    /// the population.
    pub arrival_rate: Option<f64>,

    /// Fraction of the population grouped into parties at generation.
    pub party_player_fraction: f64,

    /// Logistic slope for the win-probability model.
    pub gamma: f64,

    // Blowout scoring.
    pub blowout_skill_coefficient: f64,
    pub blowout_imbalance_coefficient: f64,
    pub blowout_mild_threshold: f64,
    pub blowout_moderate_threshold: f64,
    pub blowout_severe_threshold: f64,

    // Skill evolution.
    pub enable_skill_evolution: bool,
    pub skill_learning_rate: f64,
    pub performance_noise_std: f64,
    /// Recompute percentiles every this many completed matches.
    pub skill_update_batch_size: usize,

    /// Exact small-mode team partitioning vs. snake draft.
    pub use_exact_team_balancing: bool,

    /// Commit lobbies below the required size once everyone has waited
    /// long enough.
    pub allow_underfull_lobbies: bool,
    /// Minimum per-member wait in seconds before an under-full commit.
    pub underfull_wait_floor_secs: f64,

    /// Apply the per-DC server capacity guard.
    pub enforce_server_capacity: bool,

    pub retention: RetentionConfig,
    pub region_configs: HashMap<Region, RegionOverrides>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_ping: 200.0,
            delta_ping_initial: 10.0,
            delta_ping_rate: 2.0,
            delta_ping_max: 100.0,
            skill_similarity_initial: 0.05,
            skill_similarity_rate: 0.01,
            skill_similarity_max: 0.5,
            max_skill_disparity_initial: 0.1,
            max_skill_disparity_rate: 0.02,
            max_skill_disparity_max: 0.8,
            weight_geo: 0.3,
            weight_skill: 0.4,
            weight_input: 0.15,
            weight_platform: 0.15,
            quality_weight_ping: 0.4,
            quality_weight_skill_balance: 0.4,
            quality_weight_wait_time: 0.2,
            tick_interval: 5.0,
            num_skill_buckets: 10,
            top_k_candidates: 50,
            arrival_rate: None,
            party_player_fraction: 0.0,
            gamma: 2.0,
            blowout_skill_coefficient: 0.4,
            blowout_imbalance_coefficient: 0.3,
            blowout_mild_threshold: 0.15,
            blowout_moderate_threshold: 0.35,
            blowout_severe_threshold: 0.6,
            enable_skill_evolution: false,
            skill_learning_rate: 0.01,
            performance_noise_std: 0.15,
            skill_update_batch_size: 10,
            use_exact_team_balancing: true,
            allow_underfull_lobbies: false,
            underfull_wait_floor_secs: 120.0,
            enforce_server_capacity: true,
            retention: RetentionConfig::default(),
            region_configs: HashMap::new(),
        }
    }
}

fn finite(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NotFinite { name })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if finite(name, value)? < 0.0 {
        Err(ConfigError::Negative { name, value })
    } else {
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if finite(name, value)? <= 0.0 {
        Err(ConfigError::NotPositive { name })
    } else {
        Ok(())
    }
}

fn fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&finite(name, value)?) {
        Err(ConfigError::OutOfRange {
            name,
            value,
            lo: 0.0,
            hi: 1.0,
        })
    } else {
        Ok(())
    }
}

fn curve(
    name: &'static str,
    initial: f64,
    rate: f64,
    max: f64,
) -> Result<(), ConfigError> {
    non_negative(name, initial)?;
    non_negative(name, rate)?;
    non_negative(name, max)?;
    if max < initial {
        return Err(ConfigError::CurveMaxBelowInitial { name, initial, max });
    }
    Ok(())
}

impl EngineConfig {
    /// Validate every knob; called once by `Engine::new`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("max_ping", self.max_ping)?;
        positive("tick_interval", self.tick_interval)?;
        curve(
            "delta_ping",
            self.delta_ping_initial,
            self.delta_ping_rate,
            self.delta_ping_max,
        )?;
        curve(
            "skill_similarity",
            self.skill_similarity_initial,
            self.skill_similarity_rate,
            self.skill_similarity_max,
        )?;
        curve(
            "max_skill_disparity",
            self.max_skill_disparity_initial,
            self.max_skill_disparity_rate,
            self.max_skill_disparity_max,
        )?;
        non_negative("weight_geo", self.weight_geo)?;
        non_negative("weight_skill", self.weight_skill)?;
        non_negative("weight_input", self.weight_input)?;
        non_negative("weight_platform", self.weight_platform)?;
        non_negative("quality_weight_ping", self.quality_weight_ping)?;
        non_negative(
            "quality_weight_skill_balance",
            self.quality_weight_skill_balance,
        )?;
        non_negative("quality_weight_wait_time", self.quality_weight_wait_time)?;
        if self.num_skill_buckets == 0 {
            return Err(ConfigError::ZeroCount {
                name: "num_skill_buckets",
            });
        }
        if self.top_k_candidates == 0 {
            return Err(ConfigError::ZeroCount {
                name: "top_k_candidates",
            });
        }
        if let Some(rate) = self.arrival_rate {
            non_negative("arrival_rate", rate)?;
        }
        fraction("party_player_fraction", self.party_player_fraction)?;
        non_negative("gamma", self.gamma)?;
        non_negative("blowout_skill_coefficient", self.blowout_skill_coefficient)?;
        non_negative(
            "blowout_imbalance_coefficient",
            self.blowout_imbalance_coefficient,
        )?;
        non_negative("blowout_mild_threshold", self.blowout_mild_threshold)?;
        non_negative("blowout_moderate_threshold", self.blowout_moderate_threshold)?;
        non_negative("blowout_severe_threshold", self.blowout_severe_threshold)?;
        if self.blowout_mild_threshold > self.blowout_moderate_threshold
            || self.blowout_moderate_threshold > self.blowout_severe_threshold
        {
            return Err(ConfigError::UnorderedBlowoutThresholds);
        }
        non_negative("skill_learning_rate", self.skill_learning_rate)?;
        non_negative("performance_noise_std", self.performance_noise_std)?;
        if self.skill_update_batch_size == 0 {
            return Err(ConfigError::ZeroCount {
                name: "skill_update_batch_size",
            });
        }
        non_negative("underfull_wait_floor_secs", self.underfull_wait_floor_secs)?;

        let r = &self.retention;
        for (name, value) in [
            ("theta_ping", r.theta_ping),
            ("theta_search_time", r.theta_search_time),
            ("theta_blowout", r.theta_blowout),
            ("theta_win_rate", r.theta_win_rate),
            ("theta_performance", r.theta_performance),
            ("base_logit", r.base_logit),
        ] {
            finite(name, value)?;
        }
        if r.experience_window == 0 {
            return Err(ConfigError::ZeroCount {
                name: "experience_window",
            });
        }
        fraction("continue_floor", r.continue_floor)?;

        for overrides in self.region_configs.values() {
            if let Some(v) = overrides.max_ping {
                positive("region max_ping", v)?;
            }
            for (name, v) in [
                ("region delta_ping_initial", overrides.delta_ping_initial),
                ("region delta_ping_rate", overrides.delta_ping_rate),
            ] {
                if let Some(v) = v {
                    non_negative(name, v)?;
                }
            }
        }
        Ok(())
    }

    /// Admissible delta ping after `wait_secs` of queueing.
    pub fn delta_ping_backoff(&self, wait_secs: f64) -> f64 {
        (self.delta_ping_initial + self.delta_ping_rate * wait_secs).min(self.delta_ping_max)
    }

    /// Admissible skill-similarity half-width after `wait_secs`.
    pub fn skill_similarity_backoff(&self, wait_secs: f64) -> f64 {
        (self.skill_similarity_initial + self.skill_similarity_rate * wait_secs)
            .min(self.skill_similarity_max)
    }

    /// Admissible lobby skill disparity after `wait_secs`.
    pub fn skill_disparity_backoff(&self, wait_secs: f64) -> f64 {
        (self.max_skill_disparity_initial + self.max_skill_disparity_rate * wait_secs)
            .min(self.max_skill_disparity_max)
    }

    fn overrides(&self, region: Region) -> Option<&RegionOverrides> {
        self.region_configs.get(&region)
    }

    /// Hard ping ceiling for a player's region.
    pub fn region_max_ping(&self, region: Region) -> f64 {
        self.overrides(region)
            .and_then(|o| o.max_ping)
            .unwrap_or(self.max_ping)
    }

    /// Delta-ping backoff with any per-region overrides applied.
    pub fn region_delta_ping_backoff(&self, region: Region, wait_secs: f64) -> f64 {
        let o = self.overrides(region);
        let initial = o
            .and_then(|o| o.delta_ping_initial)
            .unwrap_or(self.delta_ping_initial);
        let rate = o
            .and_then(|o| o.delta_ping_rate)
            .unwrap_or(self.delta_ping_rate);
        (initial + rate * wait_secs).min(self.delta_ping_max)
    }
}
