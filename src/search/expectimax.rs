use std::collections::HashMap;

use tracing::debug;

use crate::engine::{Grid, Move, SPAWN_ODDS};

use super::heuristic::{Evaluator, HeuristicWeights};
use super::{leaf_value, Search, SearchBudget, SearchContext, SearchOutcome, SearchStats};

enum Node { Max, Chance }

/// Per-branch expected value at the root (no normalization).
///
/// - `ev` is the expected value for taking `dir` from the current grid.
/// - `legal` is false when the move is a no-op for the current grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

/// Depth-bounded expectimax.
///
/// Depth is counted in full turns, each made of two half-plies: the agent's move
/// (max node) and the spawn reply (chance node). A chance node averages over every
/// empty cell and both spawn values, weighted by `(1 / empty) * p(value)`.
///
/// Leaves: exhausted depth scores with the evaluator, a lost grid scores `-inf` and a
/// won grid `+inf`.
#[derive(Debug, Clone)]
pub struct Expectimax {
    weights: HeuristicWeights,
    cache_enabled: bool,
    prob_cutoff: f64,
    budget: SearchBudget,
    stats: SearchStats,
}

struct Walk<'a, const N: usize> {
    ev: &'a Evaluator<N>,
    ctx: SearchContext,
    cache: HashMap<(Grid<N>, u32), f64>,
}

#[derive(Debug, Clone, Copy)]
struct ExpectimaxResult { score: f64, move_dir: Option<Move> }

impl Expectimax {
    pub fn new(weights: HeuristicWeights) -> Self {
        Self {
            weights,
            cache_enabled: true,
            prob_cutoff: 0.0,
            budget: SearchBudget::UNLIMITED,
            stats: SearchStats::default(),
        }
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Score chance branches below `cutoff` cumulative probability with the evaluator.
    ///
    /// A non-zero cutoff turns the transposition cache off: a cached value would depend
    /// on the probability of the path that first reached the grid.
    pub fn with_prob_cutoff(mut self, cutoff: f64) -> Self {
        self.prob_cutoff = cutoff;
        self
    }

    pub fn with_budget(mut self, budget: SearchBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Compute EV for each direction (no normalization).
    ///
    /// Returns one entry per direction in `Move::ALL` order and marks illegal moves
    /// as `legal=false`.
    ///
    /// ```
    /// use ai_2048_solver::engine::Board;
    /// use ai_2048_solver::search::{Expectimax, HeuristicWeights};
    /// let b = Board::from_rows([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let mut ex = Expectimax::new(HeuristicWeights::default());
    /// let branches = ex.branch_evals(b, 1);
    /// assert_eq!(branches.len(), 4);
    /// assert!(!branches[0].legal); // Left does nothing
    /// ```
    pub fn branch_evals<const N: usize>(&mut self, grid: Grid<N>, depth: u32) -> [BranchEval; 4] {
        let ev = Evaluator::<N>::new(&self.weights);
        let mut walk = Walk { ev: &ev, ctx: SearchContext::new(self.budget), cache: HashMap::new() };
        let remaining = depth.saturating_mul(2).saturating_sub(1);
        let out = Move::ALL.map(|dir| {
            let shift = grid.shift(dir);
            if shift.changed {
                let ev = self.expectimax(shift.grid, Node::Chance, remaining, 1.0, &mut walk).score;
                BranchEval { dir, ev, legal: true }
            } else {
                BranchEval { dir, ev: 0.0, legal: false }
            }
        });
        self.stats.record(walk.ctx.nodes);
        out
    }

    /// EV at root (max node), equivalent to the best branch EV.
    pub fn state_value<const N: usize>(&mut self, grid: Grid<N>, depth: u32) -> f64 {
        self.search(grid, depth).value
    }

    fn caching(&self) -> bool { self.cache_enabled && self.prob_cutoff == 0.0 }

    fn expectimax<const N: usize>(
        &self,
        grid: Grid<N>,
        node: Node,
        remaining: u32,
        cum_prob: f64,
        walk: &mut Walk<'_, N>,
    ) -> ExpectimaxResult {
        let expired = walk.ctx.enter();
        if grid.is_win() {
            return ExpectimaxResult { score: f64::INFINITY, move_dir: None };
        }
        if expired {
            return ExpectimaxResult { score: leaf_value(&grid, walk.ev), move_dir: None };
        }
        match node {
            Node::Max => self.evaluate_max(grid, remaining, cum_prob, walk),
            Node::Chance => self.evaluate_chance(grid, remaining, cum_prob, walk),
        }
    }

    fn evaluate_max<const N: usize>(
        &self,
        grid: Grid<N>,
        remaining: u32,
        cum_prob: f64,
        walk: &mut Walk<'_, N>,
    ) -> ExpectimaxResult {
        if remaining == 0 {
            return ExpectimaxResult { score: leaf_value(&grid, walk.ev), move_dir: None };
        }
        let mut best_score = f64::NEG_INFINITY;
        let mut best_move = None;
        for (direction, shift) in grid.successors() {
            let score = self.expectimax(shift.grid, Node::Chance, remaining - 1, cum_prob, walk).score;
            if walk.ctx.expired() && best_move.is_some() {
                break;
            }
            if best_move.is_none() || score > best_score {
                best_score = score;
                best_move = Some(direction);
            }
        }
        // A grid without successors is lost and keeps `-inf`.
        ExpectimaxResult { score: best_score, move_dir: best_move }
    }

    fn evaluate_chance<const N: usize>(
        &self,
        grid: Grid<N>,
        remaining: u32,
        cum_prob: f64,
        walk: &mut Walk<'_, N>,
    ) -> ExpectimaxResult {
        if remaining == 0 || cum_prob < self.prob_cutoff {
            return ExpectimaxResult { score: walk.ev.evaluate(&grid), move_dir: None };
        }
        if self.caching() {
            if let Some(&score) = walk.cache.get(&(grid, remaining)) {
                return ExpectimaxResult { score, move_dir: None };
            }
        }
        let num_empty_tiles = grid.count_empty();
        if num_empty_tiles == 0 {
            return ExpectimaxResult { score: walk.ev.evaluate(&grid), move_dir: None };
        }
        let base_prob = 1.0 / num_empty_tiles as f64;
        let mut score = 0.0;
        for (r, c) in grid.empty_cells() {
            for (exponent, p) in SPAWN_ODDS {
                let prob = base_prob * p;
                let child = grid.with_tile(r, c, exponent);
                score += prob * self.expectimax(child, Node::Max, remaining - 1, cum_prob * prob, walk).score;
            }
        }
        if self.caching() && !walk.ctx.expired() {
            walk.cache.insert((grid, remaining), score);
        }
        ExpectimaxResult { score, move_dir: None }
    }
}

impl Search for Expectimax {
    /// Compute the best move using expectimax.
    ///
    /// ```
    /// use ai_2048_solver::engine::Board;
    /// use ai_2048_solver::search::{Expectimax, HeuristicWeights, Search};
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// let mut ex = Expectimax::new(HeuristicWeights::default());
    /// assert!(ex.best_move(b, 2).is_some());
    /// ```
    fn search<const N: usize>(&mut self, grid: Grid<N>, depth: u32) -> SearchOutcome {
        let ev = Evaluator::<N>::new(&self.weights);
        let mut walk = Walk { ev: &ev, ctx: SearchContext::new(self.budget), cache: HashMap::new() };
        // The root always gets to try at least one move, whatever the budget says.
        walk.ctx.enter();
        let result = if grid.is_win() {
            ExpectimaxResult { score: f64::INFINITY, move_dir: None }
        } else {
            self.evaluate_max(grid, depth.saturating_mul(2), 1.0, &mut walk)
        };
        self.stats.record(walk.ctx.nodes);
        let outcome = SearchOutcome { best_move: result.move_dir, value: result.score, completed: !walk.ctx.expired() };
        debug!(
            depth,
            nodes = walk.ctx.nodes,
            cached = walk.cache.len(),
            best = ?outcome.best_move,
            value = outcome.value,
            completed = outcome.completed,
            "expectimax search finished"
        );
        outcome
    }

    fn last_stats(&self) -> SearchStats { self.stats }

    fn reset_stats(&mut self) { self.stats = SearchStats::default(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Board;
    use rand::{rngs::StdRng, SeedableRng};

    fn weights() -> HeuristicWeights { HeuristicWeights::default() }

    fn midgame(seed: u64) -> Board {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        for dir in [Move::Left, Move::Up, Move::Right, Move::Up, Move::Left, Move::Down, Move::Left, Move::Up] {
            let shift = b.shift(dir);
            if shift.changed {
                b = shift.grid.with_random_tile(&mut rng);
            }
        }
        b
    }

    #[test]
    fn deterministic_recommendation() {
        let board = midgame(8);
        let mut ex = Expectimax::new(weights());
        let a = ex.search(board, 2);
        let b = ex.search(board, 2);
        assert_eq!(a, b);
        let mut fresh = Expectimax::new(weights());
        assert_eq!(fresh.search(board, 2), a);
    }

    #[test]
    fn one_turn_expectation_by_hand() {
        // Only Right and Down are legal; check the chance average behind Right.
        let board = Board::from_rows([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        let ev = Evaluator::<4>::new(&weights());
        let moved = board.shift(Move::Right).grid;
        let empty: Vec<_> = moved.empty_cells().collect();
        let p = 1.0 / empty.len() as f64;
        let mut expected = 0.0;
        for &(r, c) in &empty {
            for (e, q) in SPAWN_ODDS {
                expected += p * q * ev.evaluate(&moved.with_tile(r, c, e));
            }
        }
        let mut ex = Expectimax::new(weights()).with_cache(false);
        let branches = ex.branch_evals(board, 1);
        assert!(branches[1].legal);
        assert_eq!(branches[1].dir, Move::Right);
        assert_eq!(branches[1].ev, expected);
    }

    #[test]
    fn root_value_is_best_branch() {
        let board = midgame(3);
        let mut ex = Expectimax::new(weights());
        let branches = ex.branch_evals(board, 2);
        let out = ex.search(board, 2);
        let best = branches.iter().filter(|b| b.legal).map(|b| b.ev).fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(out.value, best);
        let chosen = branches.iter().find(|b| b.dir == out.best_move.unwrap()).unwrap();
        assert_eq!(chosen.ev, best);
    }

    #[test]
    fn cache_does_not_change_answer() {
        for seed in 0..6 {
            let board = midgame(seed);
            let a = Expectimax::new(weights()).search(board, 2);
            let b = Expectimax::new(weights()).with_cache(false).search(board, 2);
            assert_eq!(a.best_move, b.best_move);
            assert_eq!(a.value, b.value);
        }
    }

    #[test]
    fn cache_saves_nodes() {
        let board = midgame(4);
        let mut cached = Expectimax::new(weights());
        let mut plain = Expectimax::new(weights()).with_cache(false);
        cached.search(board, 2);
        plain.search(board, 2);
        assert!(cached.last_stats().nodes <= plain.last_stats().nodes);
    }

    #[test]
    fn depth_zero_evaluates_immediately() {
        let board = midgame(1);
        let out = Expectimax::new(weights()).search(board, 0);
        assert_eq!(out.best_move, None);
        assert_eq!(out.value, Evaluator::<4>::new(&weights()).evaluate(&board));
    }

    #[test]
    fn winning_move_is_taken() {
        let board = Board::from_rows([[0, 0, 1024, 1024], [2, 4, 8, 16], [0; 4], [0; 4]]).unwrap();
        let out = Expectimax::new(weights()).search(board, 2);
        assert_eq!(out.value, f64::INFINITY);
        // Left is the first move producing 2048.
        assert_eq!(out.best_move, Some(Move::Left));
    }

    #[test]
    fn lost_grid_has_no_move() {
        let stuck = Board::from_rows([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]).unwrap();
        let out = Expectimax::new(weights()).search(stuck, 2);
        assert_eq!(out.best_move, None);
        assert_eq!(out.value, f64::NEG_INFINITY);
    }

    #[test]
    fn moves_into_dead_ends_score_minus_infinity() {
        // Left and Up are legal, and every spawn after either leaves the grid stuck.
        let board = Board::from_rows([[0, 4, 8, 16], [32, 64, 128, 256], [4, 8, 16, 32], [32, 64, 128, 256]]).unwrap();
        assert_eq!(board.available_moves(), vec![Move::Left, Move::Up]);
        let mut ex = Expectimax::new(weights());
        let branches = ex.branch_evals(board, 1);
        assert_eq!(branches[0].ev, f64::NEG_INFINITY);
        assert_eq!(branches[2].ev, f64::NEG_INFINITY);
        let out = ex.search(board, 1);
        assert_eq!(out.value, f64::NEG_INFINITY);
        // Still answers with the first legal move.
        assert_eq!(out.best_move, Some(Move::Left));
    }

    #[test]
    fn expired_budget_still_sees_dead_grids() {
        let board = Board::from_rows([[0, 4, 8, 16], [32, 64, 128, 256], [4, 8, 16, 32], [32, 64, 128, 256]]).unwrap();
        let budget = SearchBudget { max_nodes: Some(2), time_limit: None };
        let out = Expectimax::new(weights()).with_budget(budget).search(board, 2);
        assert!(!out.completed);
        assert_eq!(out.best_move, Some(Move::Left));
        assert_eq!(out.value, f64::NEG_INFINITY);
    }

    #[test]
    fn cutoff_search_bypasses_the_cache() {
        for seed in 0..4 {
            let board = midgame(seed);
            let mut cached = Expectimax::new(weights()).with_prob_cutoff(0.02);
            let mut plain = Expectimax::new(weights()).with_cache(false).with_prob_cutoff(0.02);
            assert_eq!(cached.search(board, 2), plain.search(board, 2));
            assert_eq!(cached.last_stats().nodes, plain.last_stats().nodes);
        }
    }

    #[test]
    fn prob_cutoff_prunes_unlikely_branches() {
        let board = midgame(6);
        let mut exact = Expectimax::new(weights()).with_cache(false);
        let mut cut = Expectimax::new(weights()).with_cache(false).with_prob_cutoff(0.05);
        exact.search(board, 2);
        let out = cut.search(board, 2);
        assert!(cut.last_stats().nodes < exact.last_stats().nodes);
        assert!(out.best_move.is_some());
    }

    #[test]
    fn time_budget_still_answers() {
        let board = midgame(2);
        let budget = SearchBudget { max_nodes: None, time_limit: Some(std::time::Duration::ZERO) };
        let out = Expectimax::new(weights()).with_budget(budget).search(board, 4);
        assert!(!out.completed);
        assert!(board.available_moves().contains(&out.best_move.unwrap()));
    }

    #[test]
    fn works_on_three_by_three() {
        let grid = crate::engine::Grid::<3>::from_rows([[2, 2, 0], [0, 4, 0], [0, 0, 0]]).unwrap();
        let out = Expectimax::new(weights()).search(grid, 2);
        assert!(grid.available_moves().contains(&out.best_move.unwrap()));
    }
}
