use tracing::debug;

use crate::engine::{Grid, Move};

use super::heuristic::{Evaluator, HeuristicWeights};
use super::{leaf_value, Search, SearchBudget, SearchContext, SearchOutcome, SearchStats};

/// Depth-bounded minimax with alpha-beta pruning.
///
/// Plies alternate between the agent (maximising over its legal moves) and an
/// opponent that minimises over the *same* move set. The opponent stands in for the
/// tile spawn as a worst case; spawns themselves are never placed. Depth counts
/// single plies.
///
/// Pruning can be switched off to get the plain full-width search; both modes pick
/// the same move on every grid.
#[derive(Debug, Clone)]
pub struct Minimax {
    weights: HeuristicWeights,
    pruning: bool,
    budget: SearchBudget,
    stats: SearchStats,
}

impl Minimax {
    pub fn new(weights: HeuristicWeights) -> Self {
        Self { weights, pruning: true, budget: SearchBudget::UNLIMITED, stats: SearchStats::default() }
    }

    pub fn with_pruning(mut self, pruning: bool) -> Self {
        self.pruning = pruning;
        self
    }

    pub fn with_budget(mut self, budget: SearchBudget) -> Self {
        self.budget = budget;
        self
    }

    fn search_root<const N: usize>(
        &self,
        grid: Grid<N>,
        depth: u32,
        ev: &Evaluator<N>,
        ctx: &mut SearchContext,
    ) -> SearchOutcome {
        ctx.enter();
        if depth == 0 {
            return SearchOutcome { best_move: None, value: leaf_value(&grid, ev), completed: true };
        }
        let mut alpha = f64::NEG_INFINITY;
        let beta = f64::INFINITY;
        let mut best_value = f64::NEG_INFINITY;
        let mut best_move: Option<Move> = None;
        for (dir, shift) in grid.successors() {
            let value = self.min_value(shift.grid, depth - 1, alpha, beta, ev, ctx);
            if ctx.expired() && best_move.is_some() {
                // This subtree was cut short; keep the last fully searched answer.
                break;
            }
            // First move seen always counts, so a lost position still yields a move.
            if best_move.is_none() || value > best_value {
                best_value = value;
                best_move = Some(dir);
            }
            if self.pruning {
                alpha = alpha.max(value);
            }
        }
        SearchOutcome { best_move, value: best_value, completed: !ctx.expired() }
    }

    fn max_value<const N: usize>(
        &self,
        grid: Grid<N>,
        depth: u32,
        mut alpha: f64,
        beta: f64,
        ev: &Evaluator<N>,
        ctx: &mut SearchContext,
    ) -> f64 {
        if ctx.enter() || depth == 0 {
            return leaf_value(&grid, ev);
        }
        let mut best = f64::NEG_INFINITY;
        for (_, shift) in grid.successors() {
            let value = self.min_value(shift.grid, depth - 1, alpha, beta, ev, ctx);
            best = best.max(value);
            if self.pruning {
                alpha = alpha.max(value);
                if beta <= alpha {
                    break;
                }
            }
        }
        // No successor at all means the grid is lost.
        best
    }

    fn min_value<const N: usize>(
        &self,
        grid: Grid<N>,
        depth: u32,
        alpha: f64,
        mut beta: f64,
        ev: &Evaluator<N>,
        ctx: &mut SearchContext,
    ) -> f64 {
        if ctx.enter() || depth == 0 {
            return leaf_value(&grid, ev);
        }
        let mut worst = f64::INFINITY;
        let mut any = false;
        for (_, shift) in grid.successors() {
            any = true;
            let value = self.max_value(shift.grid, depth - 1, alpha, beta, ev, ctx);
            worst = worst.min(value);
            if self.pruning {
                beta = beta.min(value);
                if beta <= alpha {
                    break;
                }
            }
        }
        if any { worst } else { f64::NEG_INFINITY }
    }
}

impl Search for Minimax {
    fn search<const N: usize>(&mut self, grid: Grid<N>, depth: u32) -> SearchOutcome {
        let ev = Evaluator::<N>::new(&self.weights);
        let mut ctx = SearchContext::new(self.budget);
        let outcome = self.search_root(grid, depth, &ev, &mut ctx);
        self.stats.record(ctx.nodes);
        debug!(
            depth,
            nodes = ctx.nodes,
            best = ?outcome.best_move,
            value = outcome.value,
            completed = outcome.completed,
            "minimax search finished"
        );
        outcome
    }

    fn last_stats(&self) -> SearchStats { self.stats }

    fn reset_stats(&mut self) { self.stats = SearchStats::default(); }
}
