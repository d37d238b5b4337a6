//! Autoplay: ask the configured search for a move, apply it, repeat until the game ends.

use rand::Rng;
use tracing::{debug, info, warn};

use crate::engine::{Game, GameState, Grid, Move, Status};
use crate::search::{Search, SearchBudget, Searcher, StrategyConfig};

/// How an autoplay run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Won,
    Over,
    StepLimit,
}

impl Outcome {
    /// Stable byte used by the run trace.
    pub fn code(self) -> u8 {
        match self {
            Outcome::Won => 0,
            Outcome::Over => 1,
            Outcome::StepLimit => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Outcome::Won),
            1 => Some(Outcome::Over),
            2 => Some(Outcome::StepLimit),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Won => f.write_str("won"),
            Outcome::Over => f.write_str("over"),
            Outcome::StepLimit => f.write_str("step limit"),
        }
    }
}

/// One applied move, handed to the `run_with` callback.
#[derive(Debug, Clone, Copy)]
pub struct Step<const N: usize> {
    /// 1-based move number.
    pub index: u64,
    pub dir: Move,
    /// State after the move and its spawn.
    pub state: GameState<N>,
    /// Search value of the chosen move.
    pub value: f64,
    pub nodes: u64,
}

/// Trajectory and totals of a finished run.
#[derive(Debug, Clone)]
pub struct Report<const N: usize> {
    pub outcome: Outcome,
    pub final_state: GameState<N>,
    pub moves: Vec<Move>,
    /// Score before the first move, then after every move.
    pub scores: Vec<u64>,
    /// Grid before the first move, then after every move.
    pub states: Vec<Grid<N>>,
    /// Nodes visited over the whole run.
    pub nodes: u64,
    /// Largest single search.
    pub peak_nodes: u64,
}

impl<const N: usize> Report<N> {
    pub fn steps(&self) -> usize { self.moves.len() }

    pub fn highest_tile(&self) -> u64 { self.final_state.grid().highest_tile() }
}

/// Drives a [`Searcher`] against a live game.
///
/// ```
/// use ai_2048_solver::engine::GameState;
/// use ai_2048_solver::search::StrategyConfig;
/// use ai_2048_solver::solver::{Outcome, Solver};
/// use rand::{SeedableRng, rngs::StdRng};
///
/// let mut rng = StdRng::seed_from_u64(5);
/// let start: GameState<4> = GameState::initial(&mut rng);
/// let mut solver = Solver::new(StrategyConfig::minimax(2).unwrap()).with_max_steps(10);
/// let report = solver.run(start, &mut rng);
/// assert_eq!(report.outcome, Outcome::StepLimit);
/// assert_eq!(report.scores.len(), report.moves.len() + 1);
/// ```
#[derive(Debug, Clone)]
pub struct Solver {
    config: StrategyConfig,
    depth: u32,
    searcher: Searcher,
    max_steps: Option<u64>,
}

impl Solver {
    /// Build a solver for `config`. A depth of 0 is raised to 1.
    pub fn new(config: StrategyConfig) -> Self {
        let depth = if config.max_depth() == 0 {
            warn!("search depth 0 clamped to 1");
            1
        } else {
            config.max_depth()
        };
        let searcher = Searcher::from_config(&config);
        Self { config, depth, searcher, max_steps: None }
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn with_budget(mut self, budget: SearchBudget) -> Self {
        self.searcher = self.searcher.with_budget(budget);
        self
    }

    pub fn config(&self) -> &StrategyConfig { &self.config }

    /// Depth actually searched, after clamping.
    pub fn depth(&self) -> u32 { self.depth }

    pub fn run<R: Rng, const N: usize>(&mut self, state: GameState<N>, rng: &mut R) -> Report<N> {
        self.run_with(state, rng, |_| {})
    }

    /// Like [`Solver::run`], calling `on_step` after every applied move.
    pub fn run_with<R, F, const N: usize>(&mut self, state: GameState<N>, rng: &mut R, mut on_step: F) -> Report<N>
    where
        R: Rng,
        F: FnMut(&Step<N>),
    {
        let mut game = Game::from_state(state, rng);
        let mut moves = Vec::new();
        let mut scores = vec![state.score()];
        let mut states = vec![state.grid()];
        let mut nodes = 0u64;
        let mut warned = false;
        self.searcher.reset_stats();

        let outcome = loop {
            match game.status() {
                Status::Won => break Outcome::Won,
                Status::Over => break Outcome::Over,
                Status::Continue => {}
            }
            if self.max_steps.is_some_and(|limit| moves.len() as u64 >= limit) {
                break Outcome::StepLimit;
            }
            let current = game.current_state();
            let found = self.searcher.search(current.grid(), self.depth);
            let stats = self.searcher.last_stats();
            nodes += stats.nodes;
            if !found.completed && !warned {
                warn!(step = moves.len() + 1, "search budget expired, playing best move found so far");
                warned = true;
            }
            let Some(dir) = found.best_move else {
                break Outcome::Over;
            };
            let next = game.apply_move(dir);
            moves.push(dir);
            scores.push(next.score());
            states.push(next.grid());
            debug!(step = moves.len(), %dir, score = next.score(), value = found.value, nodes = stats.nodes, "move applied");
            on_step(&Step { index: moves.len() as u64, dir, state: next, value: found.value, nodes: stats.nodes });
        };

        let final_state = game.current_state();
        let peak_nodes = self.searcher.last_stats().peak_nodes;
        info!(
            algorithm = %self.config.algorithm(),
            depth = self.depth,
            %outcome,
            moves = moves.len(),
            score = final_state.score(),
            highest = final_state.grid().highest_tile(),
            nodes,
            "run finished"
        );
        Report { outcome, final_state, moves, scores, states, nodes, peak_nodes }
    }
}
