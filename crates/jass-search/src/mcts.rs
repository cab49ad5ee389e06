//! Monte-Carlo tree search over determinized boards.

use crate::board::{Actor, Board, CallLocation, HeuristicFunction, PlayoutPolicy, RandomPlayout, SearchRng};
use crate::config::{SearchBudget, SearchConfig, VotePolicy};
use crate::error::SearchError;
use crate::pool::WorkerPool;
use crate::tree::{NodeId, SearchTree};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Votes collected for one move across all trees.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveVote<M> {
    pub mv: M,
    pub votes: usize,
    /// Sum over voting trees of the move's mean score for the mover.
    pub summed_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<M> {
    pub best_move: M,
    /// Tally in order of first appearance.
    pub votes: Vec<MoveVote<M>>,
    pub simulations: u64,
    pub workers: usize,
    pub failed_workers: usize,
}

/// What one finished tree recommends.
#[derive(Debug, Clone)]
struct TreeOutcome<M> {
    mv: M,
    score: f64,
    simulations: u64,
}

/// A search engine instance. Owns its RNG and, when root parallelization is
/// enabled, its worker pool.
pub struct Mcts<B: Board> {
    config: SearchConfig,
    rng: SearchRng,
    playout: Arc<dyn PlayoutPolicy<B>>,
    heuristic: Option<Arc<dyn HeuristicFunction<B>>>,
    pool: Option<WorkerPool>,
}

impl<B: Board + 'static> Mcts<B> {
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let rng = SearchRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            rng,
            playout: Arc::new(RandomPlayout),
            heuristic: None,
            pool: None,
        })
    }

    pub fn with_playout(mut self, playout: impl PlayoutPolicy<B> + 'static) -> Self {
        self.playout = Arc::new(playout);
        self
    }

    pub fn with_heuristic(mut self, heuristic: impl HeuristicFunction<B> + 'static) -> Self {
        self.heuristic = Some(Arc::new(heuristic));
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Changes the number of trees searched per decision.
    pub fn set_determinizations(&mut self, determinizations: usize) -> Result<(), SearchError> {
        let config = SearchConfig {
            determinizations,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Starts a worker pool; later searches run one tree per determinization
    /// on it.
    pub fn enable_root_parallelization(&mut self, threads: usize) -> Result<(), SearchError> {
        if let Some(old) = self.pool.take() {
            old.shutdown();
        }
        self.pool = Some(WorkerPool::new(threads)?);
        Ok(())
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Tears down the worker pool, if any.
    pub fn shutdown(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }

    /// Picks a move for the actor of `board`.
    ///
    /// With one determinization and no pool, a single tree is searched over
    /// one redeterminized copy. Otherwise every tree gets its own copy and
    /// seed, and the trees vote.
    pub fn search(
        &mut self,
        board: &B,
        budget: SearchBudget,
    ) -> Result<SearchResult<B::Move>, SearchError> {
        if matches!(budget, SearchBudget::Simulations(0)) {
            return Err(SearchError::InvalidBudget);
        }
        if board.is_terminal() {
            return Err(SearchError::TerminalBoard);
        }
        if matches!(board.current_actor(), Actor::Chance) {
            return Err(SearchError::Position(
                "search must start at a player decision".to_string(),
            ));
        }
        if board.legal_moves(CallLocation::TreePolicy).is_empty() {
            return Err(SearchError::NoLegalMoves);
        }

        let workers = self.config.determinizations;
        let base_seed: u64 = self.rng.r#gen();
        let started = Instant::now();
        debug!(workers, parallel = self.pool.is_some(), "search started");

        if workers == 1 && self.pool.is_none() {
            let mut rng = SearchRng::seed_from_u64(base_seed);
            let outcome = self.search_determinization(board, budget, &mut rng)?;
            debug!(
                simulations = outcome.simulations,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "search finished"
            );
            return Ok(SearchResult {
                best_move: outcome.mv.clone(),
                votes: vec![MoveVote {
                    mv: outcome.mv,
                    votes: 1,
                    summed_score: outcome.score,
                }],
                simulations: outcome.simulations,
                workers: 1,
                failed_workers: 0,
            });
        }

        let outcomes = self.run_workers(board, budget, workers, base_seed);
        let result = self.tally(outcomes, workers)?;
        info!(
            workers,
            failed = result.failed_workers,
            simulations = result.simulations,
            best = ?result.best_move,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "root-parallel search finished"
        );
        Ok(result)
    }

    fn run_workers(
        &self,
        board: &B,
        budget: SearchBudget,
        workers: usize,
        base_seed: u64,
    ) -> Vec<Result<TreeOutcome<B::Move>, SearchError>> {
        let worker = |index: usize, budget: SearchBudget| {
            let mut rng = SearchRng::seed_from_u64(base_seed.wrapping_add(index as u64));
            self.search_determinization(board, budget, &mut rng)
        };

        match &self.pool {
            Some(pool) if matches!(budget, SearchBudget::Deadline(_)) && workers > pool.threads() => {
                self.run_in_lanes(pool, budget, workers, &worker)
            }
            Some(pool) => pool
                .run_all(workers, |index| worker(index, budget))
                .into_iter()
                .enumerate()
                .map(|(index, result)| {
                    result.unwrap_or_else(|message| {
                        Err(SearchError::WorkerPanicked { index, message })
                    })
                })
                .collect(),
            None => (0..workers)
                .map(|index| worker(index, sequential_slice(budget, workers - index)))
                .collect(),
        }
    }

    /// Deadline search with more trees than threads. Each thread runs the
    /// trees `lane, lane + lanes, ...` back to back, splitting what is left of
    /// the deadline between them, so every tree gets time before it expires.
    fn run_in_lanes<W>(
        &self,
        pool: &WorkerPool,
        budget: SearchBudget,
        workers: usize,
        worker: &W,
    ) -> Vec<Result<TreeOutcome<B::Move>, SearchError>>
    where
        W: Fn(usize, SearchBudget) -> Result<TreeOutcome<B::Move>, SearchError> + Sync,
    {
        let lanes = pool.threads().clamp(1, workers);
        debug!(workers, lanes, "sharing the deadline between trees on each thread");
        let per_lane = pool.run_all(lanes, |lane| {
            let trees: Vec<usize> = (lane..workers).step_by(lanes).collect();
            let count = trees.len();
            trees
                .into_iter()
                .enumerate()
                .map(|(done, index)| (index, worker(index, sequential_slice(budget, count - done))))
                .collect::<Vec<_>>()
        });

        let mut outcomes: Vec<Option<Result<TreeOutcome<B::Move>, SearchError>>> =
            (0..workers).map(|_| None).collect();
        for (lane, result) in per_lane.into_iter().enumerate() {
            match result {
                Ok(trees) => {
                    for (index, outcome) in trees {
                        outcomes[index] = Some(outcome);
                    }
                }
                Err(message) => {
                    for index in (lane..workers).step_by(lanes) {
                        outcomes[index] = Some(Err(SearchError::WorkerPanicked {
                            index,
                            message: message.clone(),
                        }));
                    }
                }
            }
        }
        outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or(Err(SearchError::NoSimulations)))
            .collect()
    }

    fn tally(
        &self,
        outcomes: Vec<Result<TreeOutcome<B::Move>, SearchError>>,
        workers: usize,
    ) -> Result<SearchResult<B::Move>, SearchError> {
        let mut votes: Vec<MoveVote<B::Move>> = Vec::new();
        let mut simulations = 0;
        let mut failed_workers = 0;

        for (index, outcome) in outcomes.into_iter().enumerate() {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(worker = index, error = %err, "search worker failed");
                    failed_workers += 1;
                    continue;
                }
            };
            simulations += outcome.simulations;
            match votes.iter_mut().find(|vote| vote.mv == outcome.mv) {
                Some(vote) => {
                    vote.votes += 1;
                    vote.summed_score += outcome.score;
                }
                None => votes.push(MoveVote {
                    mv: outcome.mv,
                    votes: 1,
                    summed_score: outcome.score,
                }),
            }
        }

        let best_move = elect(&votes, self.config.vote_policy)
            .ok_or(SearchError::AllWorkersFailed { workers })?;
        Ok(SearchResult {
            best_move,
            votes,
            simulations,
            workers,
            failed_workers,
        })
    }

    /// Runs one complete tree search over a fresh determinization of `board`.
    fn search_determinization(
        &self,
        board: &B,
        budget: SearchBudget,
        rng: &mut SearchRng,
    ) -> Result<TreeOutcome<B::Move>, SearchError> {
        let determinized = board
            .redeterminize(rng)
            .map_err(|err| SearchError::Determinization(err.to_string()))?;
        self.run_tree(&determinized, budget, rng)
    }

    fn run_tree(
        &self,
        board: &B,
        budget: SearchBudget,
        rng: &mut SearchRng,
    ) -> Result<TreeOutcome<B::Move>, SearchError> {
        let mut tree = SearchTree::new(board.current_actor(), board.player_count());
        let mut simulations = 0u64;

        while !budget.is_exhausted(simulations) {
            let mut descent = board.duplicate();
            let leaf = self.tree_policy(&mut tree, &mut descent, rng);
            let scores = self.simulate(&descent, rng);
            tree.backpropagate(leaf, &scores);
            if self.config.score_bounds {
                tree.propagate_bounds(leaf);
            }
            simulations += 1;
        }

        if simulations == 0 {
            return Err(SearchError::NoSimulations);
        }
        let root = tree.root();
        let best = tree
            .final_child(root, &self.config)
            .ok_or(SearchError::NoSimulations)?;
        let node = tree.node(best);
        let mv = node
            .incoming_move()
            .cloned()
            .ok_or(SearchError::NoLegalMoves)?;
        let player = match board.current_actor() {
            Actor::Player(player) => player,
            Actor::Chance => 0,
        };
        Ok(TreeOutcome {
            mv,
            score: node.mean(player),
            simulations,
        })
    }

    /// Walks from the root to a leaf, applying each chosen move to `descent`.
    fn tree_policy(
        &self,
        tree: &mut SearchTree<B::Move>,
        descent: &mut B,
        rng: &mut SearchRng,
    ) -> NodeId {
        let mut node = tree.root();
        loop {
            if descent.is_terminal() {
                return node;
            }
            if !tree.node(node).is_expanded() {
                tree.expand(node, descent);
            }

            let (next, stop) = match tree.node(node).actor() {
                Actor::Chance => (tree.chance_child(node, rng), false),
                Actor::Player(_) => match tree.random_unvisited(node, rng) {
                    Some(child) => (Some(child), true),
                    None => {
                        let board: &B = descent;
                        let child = tree.select_child(
                            node,
                            &self.config,
                            |mv| {
                                self.heuristic
                                    .as_ref()
                                    .map_or(0.0, |heuristic| heuristic.evaluate(board, mv))
                            },
                            rng,
                        );
                        (child, false)
                    }
                },
            };

            let Some(next) = next else {
                return node;
            };
            if let Some(mv) = tree.node(next).incoming_move() {
                descent.apply_move(mv);
            }
            if stop {
                return next;
            }
            node = next;
        }
    }

    /// Scores a leaf: a learned estimate when available, else the average of
    /// `playouts_per_leaf` rollouts on fresh copies.
    fn simulate(&self, leaf: &B, rng: &mut SearchRng) -> Vec<f64> {
        if leaf.is_terminal() {
            return leaf.score_vector();
        }
        if leaf.has_learned_evaluator() {
            return leaf.estimate_score_vector();
        }

        let runs = self.config.playouts_per_leaf;
        let mut totals = vec![0.0; leaf.player_count()];
        for _ in 0..runs {
            let scores = self.rollout(leaf, rng);
            for (total, score) in totals.iter_mut().zip(&scores) {
                *total += score;
            }
        }
        for total in &mut totals {
            *total /= runs as f64;
        }
        totals
    }

    fn rollout(&self, leaf: &B, rng: &mut SearchRng) -> Vec<f64> {
        let mut board = leaf.duplicate();
        while !board.is_terminal() {
            let moves = board.legal_moves(CallLocation::Playout);
            if moves.is_empty() {
                break;
            }
            let index = match board.current_actor() {
                Actor::Chance => weighted_choice(&board.move_weights(), moves.len(), rng),
                Actor::Player(_) => self.playout.choose(&board, &moves, rng),
            };
            board.apply_move(&moves[index.min(moves.len() - 1)]);
        }
        board.score_vector()
    }
}

impl<B: Board> Drop for Mcts<B> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            warn!("search engine dropped without shutting down its worker pool");
            pool.shutdown();
        }
    }
}

fn weighted_choice(weights: &[f64], len: usize, rng: &mut SearchRng) -> usize {
    if weights.len() == len {
        if let Ok(dist) = WeightedIndex::new(weights) {
            return dist.sample(rng);
        }
    }
    rng.gen_range(0..len)
}

/// Share of a deadline given to the next of `remaining` trees run back to back.
fn sequential_slice(budget: SearchBudget, remaining: usize) -> SearchBudget {
    match budget {
        SearchBudget::Deadline(deadline) => {
            let now = Instant::now();
            let left = deadline.saturating_duration_since(now);
            SearchBudget::Deadline(now + left / remaining.max(1) as u32)
        }
        simulations => simulations,
    }
}

fn elect<M: Clone>(votes: &[MoveVote<M>], policy: VotePolicy) -> Option<M> {
    let mut best: Option<&MoveVote<M>> = None;
    for vote in votes {
        let better = match best {
            None => true,
            Some(current) => match policy {
                VotePolicy::Plurality => {
                    vote.votes > current.votes
                        || (vote.votes == current.votes && vote.summed_score > current.summed_score)
                }
                VotePolicy::SummedScore => {
                    vote.summed_score > current.summed_score
                        || (vote.summed_score == current.summed_score && vote.votes > current.votes)
                }
            },
        };
        if better {
            best = Some(vote);
        }
    }
    best.map(|vote| vote.mv.clone())
}
