//! Move search for 2048: alpha-beta minimax and expectimax.
//!
//! Both strategies walk the same tree of grid transitions and score the frontier
//! with [`heuristic::Evaluator`]. They differ only in how the environment's reply
//! is modelled:
//! - [`Minimax`]: the reply is an adversary that picks the worst of the agent's own
//!   moves. This is a deliberate worst-case approximation, not a chance model.
//! - [`Expectimax`]: the reply is every possible tile spawn, weighted by its probability.
//!
//! Searches are deterministic: hypothetical spawns are enumerated, never sampled, and
//! the live game RNG is never touched.
//!
//! Quick start
//! ```
//! use ai_2048_solver::engine::{Board, GameState};
//! use ai_2048_solver::search::{recommend_move, Algorithm, HeuristicWeights, StrategyConfig};
//!
//! let grid = Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
//! let state = GameState::new(grid, 0);
//! let cfg = StrategyConfig::new(Algorithm::Expectimax, 2, HeuristicWeights::default()).unwrap();
//! assert!(recommend_move(&state, &cfg).is_some());
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::engine::{GameState, Grid, Move, Status};

pub mod heuristic;
mod expectimax;
mod minimax;

pub use expectimax::{BranchEval, Expectimax};
pub use heuristic::{Evaluator, HeuristicWeights};
pub use minimax::Minimax;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("search depth must not be negative (got {0})")]
    NegativeDepth(i64),
    #[error("search depth {0} is too large")]
    DepthTooLarge(i64),
    #[error("heuristic weights are all zero")]
    EmptyWeights,
    #[error("heuristic weight `{0}` is not finite")]
    NonFiniteWeight(&'static str),
    #[error("snake base must be >= 1 (got {0})")]
    SnakeBase(f64),
    #[error("probability cutoff must be in [0, 1) (got {0})")]
    ProbCutoff(f64),
}

/// Which search strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Minimax,
    #[default]
    Expectimax,
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::Minimax => f.write_str("minimax"),
            Algorithm::Expectimax => f.write_str("expectimax"),
        }
    }
}

/// Validated search configuration: algorithm, search depth and heuristic weights.
///
/// - `cache_enabled`: expectimax transposition table (per search call).
/// - `prob_cutoff`: expectimax scores chance branches below this cumulative
///   probability with the evaluator instead of expanding them. `0.0` keeps the search exact.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    algorithm: Algorithm,
    max_depth: u32,
    weights: HeuristicWeights,
    cache_enabled: bool,
    prob_cutoff: f64,
}

impl StrategyConfig {
    /// Largest accepted depth. Deeper searches would not finish in any useful time.
    pub const MAX_DEPTH: u32 = 32;

    pub fn new(algorithm: Algorithm, max_depth: i64, weights: HeuristicWeights) -> Result<Self, ConfigError> {
        if max_depth < 0 {
            return Err(ConfigError::NegativeDepth(max_depth));
        }
        if max_depth > i64::from(Self::MAX_DEPTH) {
            return Err(ConfigError::DepthTooLarge(max_depth));
        }
        weights.validate()?;
        Ok(Self { algorithm, max_depth: max_depth as u32, weights, cache_enabled: true, prob_cutoff: 0.0 })
    }

    pub fn minimax(max_depth: i64) -> Result<Self, ConfigError> {
        Self::new(Algorithm::Minimax, max_depth, HeuristicWeights::default())
    }

    pub fn expectimax(max_depth: i64) -> Result<Self, ConfigError> {
        Self::new(Algorithm::Expectimax, max_depth, HeuristicWeights::default())
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_prob_cutoff(mut self, cutoff: f64) -> Result<Self, ConfigError> {
        if !(0.0..1.0).contains(&cutoff) {
            return Err(ConfigError::ProbCutoff(cutoff));
        }
        self.prob_cutoff = cutoff;
        Ok(self)
    }

    #[inline]
    pub fn algorithm(&self) -> Algorithm { self.algorithm }
    #[inline]
    pub fn max_depth(&self) -> u32 { self.max_depth }
    #[inline]
    pub fn weights(&self) -> &HeuristicWeights { &self.weights }
    #[inline]
    pub fn cache_enabled(&self) -> bool { self.cache_enabled }
    #[inline]
    pub fn prob_cutoff(&self) -> f64 { self.prob_cutoff }
}

/// Optional limits layered on top of the depth bound for interactive use.
///
/// Checked on every recursive entry. On expiry the search unwinds and returns the best
/// root move whose subtree finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchBudget {
    pub max_nodes: Option<u64>,
    pub time_limit: Option<Duration>,
}

impl SearchBudget {
    pub const UNLIMITED: SearchBudget = SearchBudget { max_nodes: None, time_limit: None };

    pub fn is_unlimited(&self) -> bool { self.max_nodes.is_none() && self.time_limit.is_none() }
}

/// Basic search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
}

impl SearchStats {
    fn record(&mut self, nodes: u64) {
        self.nodes = nodes;
        self.peak_nodes = self.peak_nodes.max(nodes);
    }
}

/// Result of one root search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    /// `None` when the grid has no legal move or the depth is 0.
    pub best_move: Option<Move>,
    /// Value of the root (of `best_move` when there is one).
    pub value: f64,
    /// False when the budget expired before every root move was searched.
    pub completed: bool,
}

/// Shared interface of the tree-walking strategies.
pub trait Search {
    /// Search `depth` levels below `grid` (plies for minimax, full turns for expectimax)
    /// and return the chosen move and its value.
    fn search<const N: usize>(&mut self, grid: Grid<N>, depth: u32) -> SearchOutcome;

    /// Statistics collected from the last call to [`Search::search`].
    fn last_stats(&self) -> SearchStats;

    /// Reset accumulated stats to zero.
    fn reset_stats(&mut self);

    fn best_move<const N: usize>(&mut self, grid: Grid<N>, depth: u32) -> Option<Move> {
        self.search(grid, depth).best_move
    }
}

/// Strategy selected by configuration.
#[derive(Debug, Clone)]
pub enum Searcher {
    Minimax(Minimax),
    Expectimax(Expectimax),
}

impl Searcher {
    pub fn from_config(cfg: &StrategyConfig) -> Self {
        match cfg.algorithm() {
            Algorithm::Minimax => Searcher::Minimax(Minimax::new(cfg.weights().clone())),
            Algorithm::Expectimax => Searcher::Expectimax(
                Expectimax::new(cfg.weights().clone())
                    .with_cache(cfg.cache_enabled())
                    .with_prob_cutoff(cfg.prob_cutoff()),
            ),
        }
    }

    pub fn with_budget(self, budget: SearchBudget) -> Self {
        match self {
            Searcher::Minimax(s) => Searcher::Minimax(s.with_budget(budget)),
            Searcher::Expectimax(s) => Searcher::Expectimax(s.with_budget(budget)),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Searcher::Minimax(_) => Algorithm::Minimax,
            Searcher::Expectimax(_) => Algorithm::Expectimax,
        }
    }
}

impl Search for Searcher {
    fn search<const N: usize>(&mut self, grid: Grid<N>, depth: u32) -> SearchOutcome {
        match self {
            Searcher::Minimax(s) => s.search(grid, depth),
            Searcher::Expectimax(s) => s.search(grid, depth),
        }
    }

    fn last_stats(&self) -> SearchStats {
        match self {
            Searcher::Minimax(s) => s.last_stats(),
            Searcher::Expectimax(s) => s.last_stats(),
        }
    }

    fn reset_stats(&mut self) {
        match self {
            Searcher::Minimax(s) => s.reset_stats(),
            Searcher::Expectimax(s) => s.reset_stats(),
        }
    }
}

/// Recommend a move for `state`, or `None` when the game is already won or over.
///
/// A configured depth of 0 searches one level, so a playable state always gets a move.
pub fn recommend_move<const N: usize>(state: &GameState<N>, cfg: &StrategyConfig) -> Option<Move> {
    if state.status() != Status::Continue {
        return None;
    }
    Searcher::from_config(cfg).best_move(state.grid(), cfg.max_depth().max(1))
}

/// Value of a node the search does not expand: `-inf` for a lost grid, else the heuristic.
pub(crate) fn leaf_value<const N: usize>(grid: &Grid<N>, ev: &Evaluator<N>) -> f64 {
    if grid.is_game_over() { f64::NEG_INFINITY } else { ev.evaluate(grid) }
}

/// Per-call node counter and budget check.
pub(crate) struct SearchContext {
    started: Instant,
    budget: SearchBudget,
    pub(crate) nodes: u64,
    expired: bool,
}

impl SearchContext {
    pub(crate) fn new(budget: SearchBudget) -> Self {
        Self { started: Instant::now(), budget, nodes: 0, expired: false }
    }

    /// Count a node; true once the budget is spent.
    pub(crate) fn enter(&mut self) -> bool {
        self.nodes = self.nodes.saturating_add(1);
        if self.expired {
            return true;
        }
        if let Some(max) = self.budget.max_nodes {
            if self.nodes > max {
                self.expired = true;
            }
        }
        if let Some(limit) = self.budget.time_limit {
            if self.started.elapsed() >= limit {
                self.expired = true;
            }
        }
        self.expired
    }

    #[inline]
    pub(crate) fn expired(&self) -> bool { self.expired }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Board;

    #[test]
    fn config_validation() {
        assert_eq!(StrategyConfig::minimax(-1), Err(ConfigError::NegativeDepth(-1)));
        assert_eq!(StrategyConfig::expectimax(1_000), Err(ConfigError::DepthTooLarge(1_000)));
        assert!(StrategyConfig::minimax(0).is_ok());
        let empty = HeuristicWeights { snake: 0.0, monotonicity: 0.0, merges: 0.0, free_tiles: 0.0, ..Default::default() };
        assert_eq!(StrategyConfig::new(Algorithm::Minimax, 3, empty), Err(ConfigError::EmptyWeights));
        let cfg = StrategyConfig::expectimax(2).unwrap();
        assert!(cfg.clone().with_prob_cutoff(1.5).is_err());
        assert_eq!(cfg.with_prob_cutoff(1e-4).unwrap().prob_cutoff(), 1e-4);
    }

    #[test]
    fn searcher_follows_config() {
        let s = Searcher::from_config(&StrategyConfig::minimax(2).unwrap());
        assert_eq!(s.algorithm(), Algorithm::Minimax);
        let s = Searcher::from_config(&StrategyConfig::expectimax(2).unwrap());
        assert_eq!(s.algorithm(), Algorithm::Expectimax);
    }

    #[test]
    fn no_move_for_finished_games() {
        let cfg = StrategyConfig::expectimax(2).unwrap();
        let stuck = Board::from_rows([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]).unwrap();
        assert_eq!(recommend_move(&GameState::new(stuck, 0), &cfg), None);
        let won = Board::from_rows([[2048, 0, 0, 0], [0; 4], [0; 4], [0, 0, 0, 2]]).unwrap();
        assert_eq!(recommend_move(&GameState::new(won, 0), &cfg), None);
    }

    #[test]
    fn recommendation_is_legal() {
        let grid = Board::from_rows([[2, 4, 8, 16], [0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 2]]).unwrap();
        let state = GameState::new(grid, 0);
        for cfg in [StrategyConfig::minimax(3).unwrap(), StrategyConfig::expectimax(2).unwrap()] {
            let mv = recommend_move(&state, &cfg).unwrap();
            assert!(state.available_moves().contains(&mv));
        }
    }

    #[test]
    fn depth_zero_still_recommends_a_move() {
        let grid = Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        let state = GameState::new(grid, 0);
        for cfg in [StrategyConfig::minimax(0).unwrap(), StrategyConfig::expectimax(0).unwrap()] {
            let mv = recommend_move(&state, &cfg).unwrap();
            assert!(state.available_moves().contains(&mv));
        }
    }

    #[test]
    fn leaf_value_scores_lost_grids_as_minus_infinity() {
        let ev = Evaluator::<4>::new(&HeuristicWeights::default());
        let stuck = Board::from_rows([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]).unwrap();
        assert_eq!(leaf_value(&stuck, &ev), f64::NEG_INFINITY);
        let open = Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        assert_eq!(leaf_value(&open, &ev), ev.evaluate(&open));
    }

    #[test]
    fn context_node_budget() {
        let mut ctx = SearchContext::new(SearchBudget { max_nodes: Some(2), time_limit: None });
        assert!(!ctx.enter());
        assert!(!ctx.enter());
        assert!(ctx.enter());
        assert!(ctx.expired());
        let mut free = SearchContext::new(SearchBudget::UNLIMITED);
        assert!((0..1_000).all(|_| !free.enter()));
    }
}
