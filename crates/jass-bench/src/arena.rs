use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use jass_core::game::serialization::GameSnapshot;
use jass_core::model::card::Card;
use jass_core::model::deck::Deck;
use jass_core::model::game::{GameState, TRICKS_PER_GAME};
use jass_core::model::mode::Mode;
use jass_core::model::seat::{Seat, Team};
use jass_search::{JassPlayer, Observation, SearchError};
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsCollector, AnalyticsError};
use crate::config::{AgentConfig, AgentKind, ArenaConfig, BudgetConfig, ResolvedOutputs};
use crate::logging::telemetry_path;

const TEAMS: usize = 2;

/// Plays seeded games between the two configured agents.
pub struct ArenaRunner {
    config: ArenaConfig,
    outputs: ResolvedOutputs,
    logging_enabled: bool,
}

/// Summary details returned after a run.
#[derive(Debug)]
pub struct RunSummary {
    pub games_played: usize,
    pub orientations: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub telemetry_path: Option<PathBuf>,
}

impl ArenaRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: ArenaConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        if config.agents.len() != TEAMS {
            return Err(RunnerError::AgentCount {
                found: config.agents.len(),
            });
        }

        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            config,
            outputs,
        })
    }

    /// Play every configured game, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut rng = StdRng::seed_from_u64(self.config.deals.seed.unwrap_or(0));
        let modes = &self.config.deals.modes;
        let orientations = self.config.deals.orientations();
        let mut analytics = AnalyticsCollector::new(&self.config)?;
        let mut rows_written = 0usize;

        for game_index in 0..self.config.deals.games {
            let deal_seed = rng.next_u64();
            let mode = modes[rng.gen_range(0..modes.len())];
            let leader = Seat::LOOP[game_index % Seat::LOOP.len()];

            for orientation in 0..orientations {
                let deal = DealSpec {
                    game_index,
                    orientation,
                    seed: deal_seed,
                    mode,
                    leader,
                };
                let outcome = self.play_game(&deal)?;
                analytics.record_game(&outcome)?;
                rows_written += write_game_rows(&mut writer, &self.config.run_id, &outcome)?;
            }
        }

        writer.flush()?;

        let summary = analytics.finalize();
        summary.write_markdown(&self.outputs.summary_md)?;

        let telemetry_path = self
            .logging_enabled
            .then(|| telemetry_path(&self.outputs));

        Ok(RunSummary {
            games_played: self.config.deals.games,
            orientations,
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            telemetry_path,
        })
    }

    fn play_game(&self, deal: &DealSpec) -> Result<GameOutcome, RunnerError> {
        let deck = Deck::shuffled_with_seed(deal.seed);
        let mut game = GameState::deal(&deck, deal.leader, deal.mode);
        let initial = GameSnapshot::capture(&game);
        let game_id = deal.id();
        let lineup = self.lineup(deal.orientation);

        let mut seats = Vec::with_capacity(Seat::LOOP.len());
        for seat in Seat::LOOP {
            let agent = lineup[seat.team().index()];
            seats.push(SeatAgent::new(seat, agent, deal.seed)?);
        }

        while let Some(seat) = game.current_player() {
            let seat_agent = &mut seats[seat.index()];
            let start = Instant::now();
            let card = seat_agent.choose(&game)?;
            let elapsed_ms = seat_agent.metrics.record(start.elapsed());

            if self.logging_enabled && tracing::enabled!(Level::INFO) {
                event!(
                    target: "jass_bench::play",
                    Level::INFO,
                    run_id = %self.config.run_id,
                    game_id = %game_id,
                    agent = %seat_agent.agent_name,
                    %seat,
                    %card,
                    elapsed_ms
                );
            }

            game.play_card(seat, card).map_err(|err| {
                RunnerError::game(format!(
                    "{} played {card} as {seat} in {game_id}: {err}",
                    seat_agent.agent_name
                ))
            })?;
        }

        let mut metrics = [DecisionMetrics::default(), DecisionMetrics::default()];
        for mut seat_agent in seats {
            seat_agent.shutdown();
            metrics[seat_agent.seat.team().index()].absorb(&seat_agent.metrics);
        }

        let teams = Team::BOTH.map(|team| TeamResult {
            team,
            agent_name: lineup[team.index()].name.clone(),
            points: game.team_points(team),
            tricks: game.tricks_won(team),
            metrics: metrics[team.index()].finalize(),
        });

        Ok(GameOutcome {
            game_id,
            deal: *deal,
            initial,
            teams,
        })
    }

    /// Agent per team; the second orientation swaps partnerships.
    fn lineup(&self, orientation: usize) -> [&AgentConfig; TEAMS] {
        let agents = &self.config.agents;
        if orientation % 2 == 0 {
            [&agents[0], &agents[1]]
        } else {
            [&agents[1], &agents[0]]
        }
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_game_rows(
    writer: &mut BufWriter<File>,
    run_id: &str,
    outcome: &GameOutcome,
) -> Result<usize, RunnerError> {
    let mut rows_written = 0usize;
    for (index, result) in outcome.teams.iter().enumerate() {
        let opponent = &outcome.teams[1 - index];
        let row = GameLogRow {
            run_id,
            game_id: &outcome.game_id,
            game_index: outcome.deal.game_index,
            orientation: outcome.deal.orientation,
            deal_seed: outcome.deal.seed,
            mode: outcome.deal.mode,
            leader: outcome.deal.leader,
            team: result.team,
            agent: &result.agent_name,
            opponent: &opponent.agent_name,
            points: result.points,
            tricks: result.tricks,
            won: result.points > opponent.points,
            matched: result.is_match(),
            decisions: result.metrics.decisions,
            speed_ms_turn: result.metrics.avg_ms_per_decision,
            deal: &outcome.initial,
        };

        serde_json::to_writer(&mut *writer, &row)?;
        writer.write_all(b"\n")?;
        rows_written += 1;
    }
    Ok(rows_written)
}

#[derive(Debug, Clone, Copy)]
pub struct DealSpec {
    pub game_index: usize,
    pub orientation: usize,
    pub seed: u64,
    pub mode: Mode,
    pub leader: Seat,
}

impl DealSpec {
    fn id(&self) -> String {
        format!("G{:05}_O{}", self.game_index, self.orientation)
    }
}

pub struct GameOutcome {
    pub game_id: String,
    pub deal: DealSpec,
    pub initial: GameSnapshot,
    pub teams: [TeamResult; TEAMS],
}

pub struct TeamResult {
    pub team: Team,
    pub agent_name: String,
    pub points: u32,
    pub tricks: u8,
    pub metrics: DecisionSummary,
}

impl TeamResult {
    pub fn is_match(&self) -> bool {
        usize::from(self.tricks) == TRICKS_PER_GAME
    }
}

#[derive(Serialize)]
struct GameLogRow<'a> {
    run_id: &'a str,
    game_id: &'a str,
    game_index: usize,
    orientation: usize,
    deal_seed: u64,
    mode: Mode,
    leader: Seat,
    team: Team,
    agent: &'a str,
    opponent: &'a str,
    points: u32,
    tricks: u8,
    won: bool,
    matched: bool,
    decisions: u32,
    speed_ms_turn: f64,
    deal: &'a GameSnapshot,
}

enum SeatPolicy {
    Random(StdRng),
    Search {
        player: Box<JassPlayer>,
        budget: BudgetConfig,
    },
}

struct SeatAgent {
    seat: Seat,
    agent_name: String,
    policy: SeatPolicy,
    metrics: DecisionMetrics,
}

impl SeatAgent {
    fn new(seat: Seat, agent: &AgentConfig, deal_seed: u64) -> Result<Self, RunnerError> {
        let seat_seed = deal_seed.wrapping_add(seat.index() as u64);
        let policy = match agent.kind {
            AgentKind::Random => SeatPolicy::Random(StdRng::seed_from_u64(seat_seed)),
            AgentKind::Mcts => {
                let config = agent
                    .search
                    .clone()
                    .with_seed(agent.search.seed.wrapping_add(seat_seed));
                let mut player = JassPlayer::new(config, agent.playout)
                    .map_err(|source| RunnerError::search(&agent.name, source))?
                    .with_sensible_rollouts(agent.sensible_rollouts);
                if let Some(level) = agent.strength {
                    player = player
                        .with_strength(level)
                        .map_err(|source| RunnerError::search(&agent.name, source))?;
                }
                SeatPolicy::Search {
                    player: Box::new(player),
                    budget: agent.budget.clone(),
                }
            }
        };

        Ok(Self {
            seat,
            agent_name: agent.name.clone(),
            policy,
            metrics: DecisionMetrics::default(),
        })
    }

    fn choose(&mut self, game: &GameState) -> Result<Card, RunnerError> {
        match &mut self.policy {
            SeatPolicy::Random(rng) => {
                let legal = game.legal_cards(self.seat);
                if legal.is_empty() {
                    return Err(RunnerError::game(format!(
                        "{} has no legal card to play",
                        self.seat
                    )));
                }
                Ok(legal[rng.gen_range(0..legal.len())])
            }
            SeatPolicy::Search { player, budget } => {
                let budget = budget
                    .search_budget()
                    .or_else(|| player.default_budget())
                    .ok_or_else(|| RunnerError::NoBudget {
                        agent: self.agent_name.clone(),
                    })?;
                let observation = Observation::of(game, self.seat);
                player
                    .choose_card(&observation, budget)
                    .map_err(|source| RunnerError::search(&self.agent_name, source))
            }
        }
    }

    fn shutdown(&mut self) {
        if let SeatPolicy::Search { player, .. } = &mut self.policy {
            player.shutdown();
        }
    }
}

#[derive(Default)]
struct DecisionMetrics {
    total: Duration,
    decisions: u32,
}

impl DecisionMetrics {
    fn record(&mut self, duration: Duration) -> f64 {
        self.total += duration;
        self.decisions += 1;
        duration.as_secs_f64() * 1000.0
    }

    fn absorb(&mut self, other: &DecisionMetrics) {
        self.total += other.total;
        self.decisions += other.decisions;
    }

    fn finalize(&self) -> DecisionSummary {
        let total_ms = self.total.as_secs_f64() * 1000.0;
        let avg_ms = if self.decisions == 0 {
            0.0
        } else {
            total_ms / f64::from(self.decisions)
        };

        DecisionSummary {
            decisions: self.decisions,
            avg_ms_per_decision: avg_ms,
            total_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionSummary {
    pub decisions: u32,
    pub avg_ms_per_decision: f64,
    pub total_ms: f64,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("game execution failed: {message}")]
    Game { message: String },
    #[error("an arena needs exactly 2 agents but found {found}")]
    AgentCount { found: usize },
    #[error("agent '{agent}' has neither a budget nor a strength level")]
    NoBudget { agent: String },
    #[error("agent '{agent}' failed to search: {source}")]
    Search {
        agent: String,
        #[source]
        source: SearchError,
    },
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
}

impl RunnerError {
    fn game(message: String) -> Self {
        RunnerError::Game { message }
    }

    fn search(agent: &str, source: SearchError) -> Self {
        RunnerError::Search {
            agent: agent.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DealConfig, LoggingConfig, MetricsConfig, OutputsConfig};
    use jass_search::{PlayoutKind, SearchConfig};
    use tempfile::tempdir;

    fn agent(name: &str, kind: AgentKind) -> AgentConfig {
        AgentConfig {
            name: name.to_string(),
            kind,
            search: SearchConfig::default(),
            playout: PlayoutKind::Light,
            strength: None,
            sensible_rollouts: false,
            budget: BudgetConfig {
                simulations: Some(20),
                thinking_ms: None,
            },
        }
    }

    fn config(dir: &Path, games: usize, agents: Vec<AgentConfig>) -> ArenaConfig {
        let mut config = ArenaConfig {
            run_id: "arena_test".to_string(),
            deals: DealConfig {
                seed: Some(7),
                games,
                modes: vec![Mode::TopDown],
                swap_teams: true,
            },
            agents,
            outputs: OutputsConfig {
                jsonl: dir.join("games.jsonl").display().to_string(),
                summary_md: dir.join("summary.md").display().to_string(),
            },
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        };
        config.validate().expect("valid config");
        config
    }

    #[test]
    fn rejects_wrong_agent_count() {
        let dir = tempdir().expect("temp dir");
        let mut cfg = config(
            dir.path(),
            1,
            vec![agent("a", AgentKind::Random), agent("b", AgentKind::Random)],
        );
        cfg.agents.pop();
        let outputs = cfg.resolved_outputs();
        let err = ArenaRunner::new(cfg, outputs).err().expect("one agent");
        assert!(matches!(err, RunnerError::AgentCount { found: 1 }));
    }

    #[test]
    fn random_arena_writes_two_rows_per_game() {
        let dir = tempdir().expect("temp dir");
        let cfg = config(
            dir.path(),
            3,
            vec![agent("a", AgentKind::Random), agent("b", AgentKind::Random)],
        );
        let outputs = cfg.resolved_outputs();
        let summary = ArenaRunner::new(cfg, outputs)
            .expect("runner")
            .run()
            .expect("arena completes");

        assert_eq!(summary.games_played, 3);
        assert_eq!(summary.orientations, 2);
        assert_eq!(summary.rows_written, 12);
        assert!(summary.telemetry_path.is_none());

        let jsonl = fs::read_to_string(&summary.jsonl_path).expect("jsonl readable");
        let rows: Vec<serde_json::Value> = jsonl
            .lines()
            .map(|line| serde_json::from_str(line).expect("row decodes"))
            .collect();
        assert_eq!(rows.len(), 12);

        for pair in rows.chunks(2) {
            let points: u64 = pair
                .iter()
                .map(|row| row["points"].as_u64().expect("points"))
                .sum();
            let tricks: u64 = pair
                .iter()
                .map(|row| row["tricks"].as_u64().expect("tricks"))
                .sum();
            assert_eq!(tricks, 9);
            assert!(points == 157 || points == 257, "points {points}");
            assert_eq!(pair[0]["game_id"], pair[1]["game_id"]);
            assert_eq!(pair[0]["agent"], pair[1]["opponent"]);
            assert_eq!(pair[0]["decisions"].as_u64(), Some(18));
        }

        // The swapped replay deals the same cards with partnerships exchanged.
        assert_eq!(rows[0]["deal"], rows[2]["deal"]);
        assert_eq!(rows[0]["agent"], rows[3]["agent"]);
        assert!(summary.summary_path.exists());
    }

    #[test]
    fn search_agent_plays_full_games() {
        let dir = tempdir().expect("temp dir");
        let cfg = config(
            dir.path(),
            1,
            vec![agent("random", AgentKind::Random), agent("mcts", AgentKind::Mcts)],
        );
        let outputs = cfg.resolved_outputs();
        let summary = ArenaRunner::new(cfg, outputs)
            .expect("runner")
            .run()
            .expect("arena completes");
        assert_eq!(summary.rows_written, 4);

        let markdown = fs::read_to_string(&summary.summary_path).expect("summary readable");
        assert!(markdown.contains("| mcts |"));
        assert!(markdown.contains("| random |"));
    }
}
