use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::arena::{DecisionSummary, GameOutcome};
use crate::config::{AgentKind, ArenaConfig};

const CONFIDENCE_Z: f64 = 1.96; // 95% CI

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("agent '{0}' played but is missing from configuration")]
    UnknownAgent(String),
    #[error("baseline '{0}' did not play in game {1}")]
    MissingBaselineGame(String, String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Accumulates per-agent results while the arena runs.
pub struct AnalyticsCollector {
    baseline: String,
    agents: Vec<AgentAccumulator>,
    differences: HashMap<String, Vec<f64>>,
    latency_budget_ms: u64,
}

impl AnalyticsCollector {
    pub fn new(config: &ArenaConfig) -> Result<Self, AnalyticsError> {
        let agents = config
            .agents
            .iter()
            .map(|agent| AgentAccumulator::new(agent.name.clone(), agent.kind))
            .collect();

        Ok(Self {
            baseline: config.metrics.baseline_name().to_string(),
            agents,
            differences: HashMap::new(),
            latency_budget_ms: config.metrics.latency_budget_ms,
        })
    }

    pub fn record_game(&mut self, outcome: &GameOutcome) -> Result<(), AnalyticsError> {
        let baseline_points = outcome
            .teams
            .iter()
            .find(|team| team.agent_name == self.baseline)
            .map(|team| f64::from(team.points))
            .ok_or_else(|| {
                AnalyticsError::MissingBaselineGame(self.baseline.clone(), outcome.game_id.clone())
            })?;

        for (index, team) in outcome.teams.iter().enumerate() {
            let opponent_points = outcome.teams[1 - index].points;
            let acc = self
                .agents
                .iter_mut()
                .find(|acc| acc.name == team.agent_name)
                .ok_or_else(|| AnalyticsError::UnknownAgent(team.agent_name.clone()))?;
            acc.record_game(
                f64::from(team.points),
                team.points > opponent_points,
                team.is_match(),
                &team.metrics,
            );

            if team.agent_name != self.baseline {
                self.differences
                    .entry(team.agent_name.clone())
                    .or_default()
                    .push(f64::from(team.points) - baseline_points);
            }
        }

        Ok(())
    }

    pub fn finalize(mut self) -> AnalyticsSummary {
        let mut agents = Vec::with_capacity(self.agents.len());
        let mut comparisons = Vec::with_capacity(self.agents.len());
        for acc in self.agents {
            let (p_value, sample_size) = match self.differences.remove(&acc.name) {
                Some(diffs) => signed_rank_test(&diffs),
                None => (1.0, 0),
            };
            comparisons.push(ComparisonReport {
                agent: acc.name.clone(),
                p_value,
                sample_size,
            });
            agents.push(acc.into_report(self.latency_budget_ms));
        }

        AnalyticsSummary {
            baseline: self.baseline,
            agents,
            comparisons,
            latency_budget_ms: self.latency_budget_ms,
        }
        .enrich()
    }
}

struct AgentAccumulator {
    name: String,
    kind: AgentKind,
    per_game_points: Vec<f64>,
    wins: usize,
    matches: usize,
    total_latency_ms: f64,
    total_decisions: u64,
}

impl AgentAccumulator {
    fn new(name: String, kind: AgentKind) -> Self {
        Self {
            name,
            kind,
            per_game_points: Vec::new(),
            wins: 0,
            matches: 0,
            total_latency_ms: 0.0,
            total_decisions: 0,
        }
    }

    fn record_game(&mut self, points: f64, won: bool, matched: bool, metrics: &DecisionSummary) {
        self.per_game_points.push(points);
        if won {
            self.wins += 1;
        }
        if matched {
            self.matches += 1;
        }
        self.total_latency_ms += metrics.total_ms;
        self.total_decisions += u64::from(metrics.decisions);
    }

    fn into_report(self, latency_budget_ms: u64) -> AgentReport {
        let games = self.per_game_points.len();
        let avg_points = if games == 0 {
            0.0
        } else {
            self.per_game_points.iter().sum::<f64>() / games as f64
        };
        let average_ms_per_decision = if self.total_decisions == 0 {
            0.0
        } else {
            self.total_latency_ms / self.total_decisions as f64
        };

        AgentReport {
            ci95: confidence_interval(&self.per_game_points),
            name: self.name,
            kind: self.kind,
            games,
            avg_points,
            wins: self.wins,
            matches: self.matches,
            average_ms_per_decision,
            delta_vs_baseline: 0.0,
            over_budget: average_ms_per_decision > latency_budget_ms as f64,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub baseline: String,
    pub agents: Vec<AgentReport>,
    pub comparisons: Vec<ComparisonReport>,
    pub latency_budget_ms: u64,
}

impl AnalyticsSummary {
    fn enrich(mut self) -> Self {
        let baseline_avg = self
            .agents
            .iter()
            .find(|agent| agent.name == self.baseline)
            .map(|agent| agent.avg_points)
            .unwrap_or(0.0);

        for agent in &mut self.agents {
            agent.delta_vs_baseline = agent.avg_points - baseline_avg;
        }

        self
    }

    pub fn p_value(&self, agent: &str) -> f64 {
        self.comparisons
            .iter()
            .find(|c| c.agent == agent)
            .map(|c| c.p_value)
            .unwrap_or(1.0)
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        let mut rows = String::new();
        rows.push_str("# Arena Summary\n\n");
        rows.push_str(&format!(
            "Baseline: {}. Latency budget: {} ms average per decision\n\n",
            self.baseline, self.latency_budget_ms
        ));
        rows.push_str("| Agent | Kind | Games | Avg points | Δ vs baseline | 95% CI | Win % | Match % | Avg ms/decision | Over Budget | p-value |\n");
        rows.push_str("|-------|------|-------|------------|----------------|--------|-------|---------|------------------|-------------|---------|\n");

        for agent in &self.agents {
            let rate = |count: usize| {
                if agent.games == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / agent.games as f64
                }
            };

            rows.push_str(&format!(
                "| {name} | {kind:?} | {games} | {avg:.2} | {delta:+.2} | [{ci_low:.2}, {ci_high:.2}] | {win:.1}% | {matched:.1}% | {latency:.2} | {over_budget} | {pval:.3} |\n",
                name = agent.name,
                kind = agent.kind,
                games = agent.games,
                avg = agent.avg_points,
                delta = agent.delta_vs_baseline,
                ci_low = agent.ci95.0,
                ci_high = agent.ci95.1,
                win = rate(agent.wins),
                matched = rate(agent.matches),
                latency = agent.average_ms_per_decision,
                over_budget = if agent.over_budget { "Yes" } else { "No" },
                pval = self.p_value(&agent.name),
            ));
        }

        fs::write(path.as_ref(), rows).map_err(|source| AnalyticsError::Io {
            context: "writing summary markdown",
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub name: String,
    pub kind: AgentKind,
    pub games: usize,
    pub avg_points: f64,
    pub ci95: (f64, f64),
    pub wins: usize,
    pub matches: usize,
    pub average_ms_per_decision: f64,
    pub delta_vs_baseline: f64,
    #[serde(skip)]
    pub over_budget: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub agent: String,
    pub p_value: f64,
    pub sample_size: usize,
}

/// Wilcoxon signed-rank test of paired point differences, normal
/// approximation with tie correction. Returns `(p, non-zero pairs)`.
fn signed_rank_test(diffs: &[f64]) -> (f64, usize) {
    let mut magnitudes: Vec<(f64, bool)> = diffs
        .iter()
        .filter(|d| d.abs() > f64::EPSILON)
        .map(|d| (d.abs(), *d > 0.0))
        .collect();
    let n = magnitudes.len();
    if n == 0 {
        return (1.0, 0);
    }
    magnitudes.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut positive_rank_sum = 0.0;
    let mut tie_correction = 0.0;
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && (magnitudes[end + 1].0 - magnitudes[start].0).abs() < 1e-12 {
            end += 1;
        }
        // Tied magnitudes share the average of their ranks.
        let rank = (start + end + 2) as f64 / 2.0;
        positive_rank_sum += rank * magnitudes[start..=end].iter().filter(|m| m.1).count() as f64;
        let ties = (end - start + 1) as f64;
        tie_correction += (ties.powi(3) - ties) / 48.0;
        start = end + 1;
    }

    let n_f = n as f64;
    let mean = n_f * (n_f + 1.0) / 4.0;
    let variance = n_f * (n_f + 1.0) * (2.0 * n_f + 1.0) / 24.0 - tie_correction;
    if variance <= 0.0 {
        return (1.0, n);
    }

    let Ok(normal) = Normal::new(0.0, 1.0) else {
        return (1.0, n);
    };
    let z = ((positive_rank_sum - mean).abs() - 0.5).max(0.0) / variance.sqrt();
    let p = 2.0 * (1.0 - normal.cdf(z));
    (p.clamp(0.0, 1.0), n)
}

fn confidence_interval(points: &[f64]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let mean = points.iter().sum::<f64>() / points.len() as f64;
    if points.len() == 1 {
        return (mean, mean);
    }
    let variance = points
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (points.len() as f64 - 1.0);
    let margin = CONFIDENCE_Z * (variance / points.len() as f64).sqrt();
    (mean - margin, mean + margin)
}
