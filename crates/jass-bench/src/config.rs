use jass_core::model::mode::Mode;
use jass_search::{PlayoutKind, SearchBudget, SearchConfig, StrengthLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

const AGENTS_PER_ARENA: usize = 2;
const DEFAULT_LATENCY_BUDGET_MS: u64 = 1_000;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root arena configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ArenaConfig {
    pub run_id: String,
    pub deals: DealConfig,
    pub agents: Vec<AgentConfig>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ArenaConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: ArenaConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.deals.validate()?;
        self.outputs.validate(&self.run_id)?;
        validate_agents(&self.agents)?;
        self.metrics.validate(&self.agents)?;
        self.logging.normalize();
        Ok(())
    }

    /// Resolve `{run_id}` placeholders into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
        }
    }
}

/// Which deals are played and how often.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DealConfig {
    pub seed: Option<u64>,
    pub games: usize,
    #[serde(default = "default_modes")]
    pub modes: Vec<Mode>,
    /// Replay every deal with the agents exchanging partnerships.
    #[serde(default = "default_swap_teams")]
    pub swap_teams: bool,
}

impl DealConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.games == 0 {
            return Err(ValidationError::InvalidField {
                field: "deals.games".to_string(),
                message: "number of games must be greater than zero".to_string(),
            });
        }

        if self.modes.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "deals.modes".to_string(),
                message: "at least one mode must be listed".to_string(),
            });
        }

        Ok(())
    }

    pub fn orientations(&self) -> usize {
        if self.swap_teams { 2 } else { 1 }
    }
}

fn default_modes() -> Vec<Mode> {
    Mode::ALL.to_vec()
}

fn default_swap_teams() -> bool {
    true
}

/// One arena participant; it plays both seats of a partnership.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub playout: PlayoutKind,
    #[serde(default)]
    pub strength: Option<StrengthLevel>,
    #[serde(default)]
    pub sensible_rollouts: bool,
    #[serde(default)]
    pub budget: BudgetConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Random,
    Mcts,
}

/// Per-decision search budget; exactly one of the two may be set.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct BudgetConfig {
    #[serde(default)]
    pub simulations: Option<u64>,
    #[serde(default)]
    pub thinking_ms: Option<u64>,
}

impl BudgetConfig {
    /// Budget for a decision starting now.
    pub fn search_budget(&self) -> Option<SearchBudget> {
        match (self.simulations, self.thinking_ms) {
            (Some(simulations), _) => Some(SearchBudget::Simulations(simulations)),
            (None, Some(ms)) => Some(SearchBudget::thinking_time(Duration::from_millis(ms))),
            (None, None) => None,
        }
    }

    fn validate(&self, agent: &str) -> Result<(), ValidationError> {
        let field = format!("agents[{agent}].budget");
        match (self.simulations, self.thinking_ms) {
            (Some(_), Some(_)) => Err(ValidationError::InvalidField {
                field,
                message: "set either simulations or thinking_ms, not both".to_string(),
            }),
            (Some(0), None) | (None, Some(0)) => Err(ValidationError::InvalidField {
                field,
                message: "budget must be greater than zero".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            if resolve_template(run_id, value).components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricsConfig {
    #[serde(default)]
    pub baseline: Option<String>,
    #[serde(default = "default_latency_budget_ms")]
    pub latency_budget_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            baseline: None,
            latency_budget_ms: DEFAULT_LATENCY_BUDGET_MS,
        }
    }
}

impl MetricsConfig {
    fn validate(&mut self, agents: &[AgentConfig]) -> Result<(), ValidationError> {
        // The first agent is the reference unless told otherwise.
        let baseline = match self.baseline.as_ref() {
            Some(name) => name.clone(),
            None => agents
                .first()
                .map(|agent| agent.name.clone())
                .unwrap_or_default(),
        };

        if !agents.iter().any(|a| a.name == baseline) {
            return Err(ValidationError::InvalidField {
                field: "metrics.baseline".to_string(),
                message: format!("baseline agent '{baseline}' is not defined in agents list"),
            });
        }
        self.baseline = Some(baseline);

        if self.latency_budget_ms == 0 {
            return Err(ValidationError::InvalidField {
                field: "metrics.latency_budget_ms".to_string(),
                message: "latency budget must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn baseline_name(&self) -> &str {
        self.baseline.as_deref().unwrap_or_default()
    }
}

fn default_latency_budget_ms() -> u64 {
    DEFAULT_LATENCY_BUDGET_MS
}

/// Structured logs are off unless requested.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn validate_agents(agents: &[AgentConfig]) -> Result<(), ValidationError> {
    if agents.len() != AGENTS_PER_ARENA {
        return Err(ValidationError::InvalidField {
            field: "agents".to_string(),
            message: format!(
                "exactly {AGENTS_PER_ARENA} agents are required, one per team (found {})",
                agents.len()
            ),
        });
    }

    let mut seen = HashSet::new();
    for agent in agents {
        if agent.name.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "agents.name".to_string(),
                message: "agent name must not be empty".to_string(),
            });
        }

        if !agent.name.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
            return Err(ValidationError::InvalidField {
                field: format!("agents[{}].name", agent.name),
                message: "agent name contains invalid characters".to_string(),
            });
        }

        if !seen.insert(agent.name.as_str()) {
            return Err(ValidationError::InvalidField {
                field: "agents".to_string(),
                message: format!("agent name '{}' defined more than once", agent.name),
            });
        }

        if agent.kind == AgentKind::Mcts {
            validate_search_agent(agent)?;
        }
    }

    Ok(())
}

fn validate_search_agent(agent: &AgentConfig) -> Result<(), ValidationError> {
    agent.budget.validate(&agent.name)?;
    if agent.budget.search_budget().is_none() && agent.strength.is_none() {
        return Err(ValidationError::InvalidField {
            field: format!("agents[{}].budget", agent.name),
            message: "mcts agents need a budget or a strength level".to_string(),
        });
    }

    agent.search.validate().map_err(|err| match err {
        jass_search::ValidationError::InvalidField { field, message } => {
            ValidationError::InvalidField {
                field: format!("agents[{}].search.{field}", agent.name),
                message,
            }
        }
    })
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{run_id}", run_id))
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use jass_search::FinalSelection;

    const BASIC_YAML: &str = r#"
run_id: "mcts_vs_random"
deals:
  seed: 123
  games: 8
agents:
  - name: "random"
    kind: "random"
  - name: "mcts"
    kind: "mcts"
    playout: "light"
    sensible_rollouts: true
    search:
      exploration_constant: 1.2
      final_selection: "max_child"
      determinizations: 4
    budget:
      simulations: 200
outputs:
  jsonl: "bench/out/{run_id}/games.jsonl"
  summary_md: "bench/out/{run_id}/summary.md"
logging:
  enable_structured: true
  tracing_level: "debug"
"#;

    fn parse(yaml: &str) -> ArenaConfig {
        serde_yaml::from_str(yaml).expect("parse yaml")
    }

    fn field_of(err: ValidationError) -> String {
        match err {
            ValidationError::InvalidField { field, .. } => field,
        }
    }

    #[test]
    fn loads_and_validates_basic_config() {
        let mut cfg = parse(BASIC_YAML);
        cfg.validate().expect("validate");

        assert_eq!(cfg.deals.modes, Mode::ALL.to_vec());
        assert!(cfg.deals.swap_teams);
        assert_eq!(cfg.deals.orientations(), 2);
        assert_eq!(cfg.metrics.baseline_name(), "random");
        assert_eq!(cfg.metrics.latency_budget_ms, DEFAULT_LATENCY_BUDGET_MS);
        assert_eq!(cfg.logging.level(), Some(Level::DEBUG));

        let mcts = &cfg.agents[1];
        assert_eq!(mcts.kind, AgentKind::Mcts);
        assert_eq!(mcts.playout, PlayoutKind::Light);
        assert_eq!(mcts.search.final_selection, FinalSelection::MaxChild);
        assert_eq!(mcts.search.determinizations, 4);
        // Fields left out keep their defaults.
        assert_eq!(mcts.search.playouts_per_leaf, SearchConfig::default().playouts_per_leaf);
        assert!(matches!(
            mcts.budget.search_budget(),
            Some(SearchBudget::Simulations(200))
        ));

        let outputs = cfg.resolved_outputs();
        assert_eq!(
            outputs.jsonl,
            PathBuf::from("bench/out/mcts_vs_random/games.jsonl")
        );
    }

    #[test]
    fn unit_modes_parse_by_name() {
        let yaml = BASIC_YAML.replace(
            "  games: 8\n",
            "  games: 8\n  modes: [\"top_down\", \"bottom_up\"]\n  swap_teams: false\n",
        );
        let mut cfg = parse(&yaml);
        cfg.validate().expect("valid");
        assert_eq!(cfg.deals.modes, vec![Mode::TopDown, Mode::BottomUp]);
        assert_eq!(cfg.deals.orientations(), 1);
    }

    #[test]
    fn rejects_unknown_baseline() {
        let yaml = BASIC_YAML.replace(
            "logging:\n",
            "metrics:\n  baseline: \"nobody\"\nlogging:\n",
        );
        let err = parse(&yaml).validate().expect_err("should fail");
        assert_eq!(field_of(err), "metrics.baseline");
    }

    #[test]
    fn rejects_duplicate_agents() {
        let yaml = BASIC_YAML.replace("name: \"mcts\"", "name: \"random\"");
        let err = parse(&yaml).validate().expect_err("duplicate agents should fail");
        assert_eq!(field_of(err), "agents");
    }

    #[test]
    fn rejects_a_single_agent() {
        let yaml = BASIC_YAML.replace("  - name: \"random\"\n    kind: \"random\"\n", "");
        let err = parse(&yaml).validate().expect_err("one agent");
        assert_eq!(field_of(err), "agents");
    }

    #[test]
    fn rejects_invalid_run_id() {
        let yaml = BASIC_YAML.replace("mcts_vs_random", "mcts vs random");
        let err = parse(&yaml).validate().expect_err("invalid run id");
        assert_eq!(field_of(err), "run_id");
    }

    #[test]
    fn rejects_zero_games() {
        let yaml = BASIC_YAML.replace("games: 8", "games: 0");
        let err = parse(&yaml).validate().expect_err("no games");
        assert_eq!(field_of(err), "deals.games");
    }

    #[test]
    fn mcts_agent_needs_a_budget() {
        let yaml = BASIC_YAML.replace("    budget:\n      simulations: 200\n", "");
        let err = parse(&yaml).validate().expect_err("no budget");
        assert_eq!(field_of(err), "agents[mcts].budget");

        let yaml = BASIC_YAML.replace(
            "    budget:\n      simulations: 200\n",
            "    strength: \"fast_test\"\n",
        );
        let mut cfg = parse(&yaml);
        cfg.validate().expect("strength implies a budget");
        assert_eq!(cfg.agents[1].strength, Some(StrengthLevel::FastTest));
    }

    #[test]
    fn rejects_conflicting_budgets() {
        let yaml = BASIC_YAML.replace(
            "      simulations: 200\n",
            "      simulations: 200\n      thinking_ms: 50\n",
        );
        let err = parse(&yaml).validate().expect_err("two budgets");
        assert_eq!(field_of(err), "agents[mcts].budget");
    }

    #[test]
    fn search_errors_are_scoped_to_the_agent() {
        let yaml = BASIC_YAML.replace("determinizations: 4", "determinizations: 0");
        let err = parse(&yaml).validate().expect_err("bad search config");
        assert_eq!(field_of(err), "agents[mcts].search.determinizations");
    }

    #[test]
    fn outputs_resolve_template_multiple_occurrences() {
        let yaml = BASIC_YAML.replace(
            "bench/out/{run_id}/summary.md",
            "bench/out/{run_id}/{run_id}/summary.md",
        );
        let mut cfg = parse(&yaml);
        cfg.validate().expect("valid");
        assert_eq!(
            cfg.resolved_outputs().summary_md,
            PathBuf::from("bench/out/mcts_vs_random/mcts_vs_random/summary.md")
        );
    }
}
