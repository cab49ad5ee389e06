use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

const DEFAULT_SEED: u64 = 42;
const DEFAULT_PLAYOUTS_PER_LEAF: usize = 2;
/// Sampling passes tried before a determinization is given up.
pub const DEFAULT_SAMPLING_ATTEMPTS: usize = 64;
/// Trees per trump decision for each unit of determinization factor.
const TRUMP_ROUND_MULTIPLIER: usize = 10;
/// Headroom kept between a search deadline and the caller's time limit.
const DEADLINE_BUFFER: Duration = Duration::from_millis(10);

/// How the search is told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBudget {
    /// Run simulations until the instant passes. In-flight simulations finish.
    Deadline(Instant),
    /// Run exactly this many simulations per tree.
    Simulations(u64),
}

impl SearchBudget {
    /// A deadline `duration` from now, minus a small safety margin.
    pub fn thinking_time(duration: Duration) -> Self {
        SearchBudget::Deadline(Instant::now() + duration.saturating_sub(DEADLINE_BUFFER))
    }

    pub fn is_exhausted(&self, simulations: u64) -> bool {
        match *self {
            SearchBudget::Deadline(deadline) => Instant::now() >= deadline,
            SearchBudget::Simulations(limit) => simulations >= limit,
        }
    }
}

/// Which root child a finished tree recommends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalSelection {
    /// Most visited child.
    #[default]
    RobustChild,
    /// Highest mean score for the player to move, bound-biased when enabled.
    MaxChild,
}

/// How worker recommendations are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePolicy {
    /// One vote per worker; the most frequent move wins.
    #[default]
    Plurality,
    /// Each worker votes with the mean score of its chosen move.
    SummedScore,
}

/// Tunables of one search instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub seed: u64,
    pub exploration_constant: f64,
    pub score_bounds: bool,
    pub optimistic_bias: f64,
    pub pessimistic_bias: f64,
    pub final_selection: FinalSelection,
    pub playouts_per_leaf: usize,
    pub vote_policy: VotePolicy,
    /// Independent trees searched per decision. One means no root parallelization.
    pub determinizations: usize,
    /// Worker threads; zero lets the pool pick one per core.
    pub threads: usize,
    pub sampling_attempts: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            exploration_constant: std::f64::consts::SQRT_2,
            score_bounds: false,
            optimistic_bias: 0.0,
            pessimistic_bias: 0.0,
            final_selection: FinalSelection::RobustChild,
            playouts_per_leaf: DEFAULT_PLAYOUTS_PER_LEAF,
            vote_policy: VotePolicy::Plurality,
            determinizations: 1,
            threads: 0,
            sampling_attempts: DEFAULT_SAMPLING_ATTEMPTS,
        }
    }
}

impl SearchConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_determinizations(mut self, determinizations: usize) -> Self {
        self.determinizations = determinizations;
        self
    }

    pub fn with_score_bounds(mut self, optimistic_bias: f64, pessimistic_bias: f64) -> Self {
        self.score_bounds = true;
        self.optimistic_bias = optimistic_bias;
        self.pessimistic_bias = pessimistic_bias;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.exploration_constant.is_finite() || self.exploration_constant < 0.0 {
            return Err(ValidationError::InvalidField {
                field: "exploration_constant".to_string(),
                message: "must be a finite, non-negative number".to_string(),
            });
        }

        for (field, value) in [
            ("optimistic_bias", self.optimistic_bias),
            ("pessimistic_bias", self.pessimistic_bias),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::InvalidField {
                    field: field.to_string(),
                    message: "must be finite".to_string(),
                });
            }
        }

        if self.playouts_per_leaf == 0 {
            return Err(ValidationError::InvalidField {
                field: "playouts_per_leaf".to_string(),
                message: "at least one playout per leaf is required".to_string(),
            });
        }

        if self.determinizations == 0 {
            return Err(ValidationError::InvalidField {
                field: "determinizations".to_string(),
                message: "at least one determinization is required".to_string(),
            });
        }

        if self.sampling_attempts == 0 {
            return Err(ValidationError::InvalidField {
                field: "sampling_attempts".to_string(),
                message: "sampling needs at least one attempt".to_string(),
            });
        }

        Ok(())
    }
}

/// Playing strength presets: determinization factor, thinking time and
/// simulation count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthLevel {
    FastTest,
    Test,
    Fast,
    #[default]
    Strong,
    Powerful,
    Extreme,
    Insane,
    Superman,
    Ironman,
}

impl StrengthLevel {
    pub const ALL: [StrengthLevel; 9] = [
        StrengthLevel::FastTest,
        StrengthLevel::Test,
        StrengthLevel::Fast,
        StrengthLevel::Strong,
        StrengthLevel::Powerful,
        StrengthLevel::Extreme,
        StrengthLevel::Insane,
        StrengthLevel::Superman,
        StrengthLevel::Ironman,
    ];

    const fn preset(self) -> (usize, u64, u64) {
        match self {
            StrengthLevel::FastTest => (1, 50, 10),
            StrengthLevel::Test => (2, 100, 20),
            StrengthLevel::Fast => (3, 200, 40),
            StrengthLevel::Strong => (4, 500, 100),
            StrengthLevel::Powerful => (5, 1_000, 200),
            StrengthLevel::Extreme => (6, 2_000, 400),
            StrengthLevel::Insane => (7, 2_500, 500),
            StrengthLevel::Superman => (8, 5_000, 1_000),
            StrengthLevel::Ironman => (9, 10_000, 2_000),
        }
    }

    pub const fn determinization_factor(self) -> usize {
        self.preset().0
    }

    pub const fn thinking_time(self) -> Duration {
        Duration::from_millis(self.preset().1)
    }

    pub const fn simulations(self) -> u64 {
        self.preset().2
    }

    /// Trees per decision; shrinks as fewer cards stay hidden.
    pub fn determinizations(self, tricks_completed: usize) -> usize {
        let remaining = 9usize.saturating_sub(tricks_completed).max(1);
        remaining * self.determinization_factor()
    }

    /// Trees per trump decision, when all 27 foreign cards are hidden.
    pub fn trump_determinizations(self) -> usize {
        TRUMP_ROUND_MULTIPLIER * self.determinization_factor()
    }

    pub fn time_budget(self) -> SearchBudget {
        SearchBudget::thinking_time(self.thinking_time())
    }

    pub fn simulation_budget(self) -> SearchBudget {
        SearchBudget::Simulations(self.simulations())
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
