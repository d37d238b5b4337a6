use serde::{Deserialize, Serialize};

use crate::engine::Grid;

use super::ConfigError;

/// Weights combining the heuristic sub-scores into one value.
///
/// `evaluate = snake·S + monotonicity·M + merges·P + free_tiles·F`, where the
/// monotonicity sub-score is a penalty (lower is more monotonic), so its weight
/// is negative by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeuristicWeights {
    pub snake: f64,
    pub monotonicity: f64,
    pub merges: f64,
    pub free_tiles: f64,
    /// Multiplier applied to empty cells in the far quadrant (`row >= N/2 && col >= N/2`).
    pub interior_bonus: f64,
    /// Base of the exponential decay along the snake path.
    pub snake_base: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            snake: 1.0,
            monotonicity: -4.0,
            merges: 700.0,
            free_tiles: 270.0,
            interior_bonus: 1.5,
            snake_base: 4.0,
        }
    }
}

impl HeuristicWeights {
    /// Reject weight sets that cannot drive a search.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("snake", self.snake),
            ("monotonicity", self.monotonicity),
            ("merges", self.merges),
            ("free_tiles", self.free_tiles),
            ("interior_bonus", self.interior_bonus),
            ("snake_base", self.snake_base),
        ];
        if let Some(&(name, _)) = named.iter().find(|(_, w)| !w.is_finite()) {
            return Err(ConfigError::NonFiniteWeight(name));
        }
        if [self.snake, self.monotonicity, self.merges, self.free_tiles].iter().all(|&w| w == 0.0) {
            return Err(ConfigError::EmptyWeights);
        }
        if self.snake_base < 1.0 {
            return Err(ConfigError::SnakeBase(self.snake_base));
        }
        Ok(())
    }
}

/// Raw, unweighted sub-scores of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Breakdown {
    pub snake: f64,
    pub monotonicity: f64,
    pub merges: f64,
    pub free_tiles: f64,
}

/// Pure grid scoring function with the snake matrix precomputed for one grid size.
#[derive(Debug, Clone)]
pub struct Evaluator<const N: usize> {
    weights: HeuristicWeights,
    snake: [[f64; N]; N],
}

impl<const N: usize> Evaluator<N> {
    pub fn new(weights: &HeuristicWeights) -> Self {
        Self { weights: weights.clone(), snake: snake_matrix(weights.snake_base) }
    }

    pub fn weights(&self) -> &HeuristicWeights { &self.weights }

    /// Weighted heuristic value of `grid`. Higher is better.
    pub fn evaluate(&self, grid: &Grid<N>) -> f64 {
        let b = self.breakdown(grid);
        let w = &self.weights;
        [(w.snake, b.snake), (w.monotonicity, b.monotonicity), (w.merges, b.merges), (w.free_tiles, b.free_tiles)]
            .iter()
            .filter(|(weight, _)| *weight != 0.0)
            .map(|(weight, score)| weight * score)
            .sum()
    }

    pub fn breakdown(&self, grid: &Grid<N>) -> Breakdown {
        Breakdown {
            snake: self.snake_score(grid),
            monotonicity: monotonicity_penalty(grid),
            merges: potential_merges(grid) as f64,
            free_tiles: self.free_tiles(grid),
        }
    }

    fn snake_score(&self, grid: &Grid<N>) -> f64 {
        let mut score = 0.0;
        for r in 0..N {
            for c in 0..N {
                let value = grid.value(r, c);
                if value != 0 {
                    score += self.snake[r][c] * value as f64;
                }
            }
        }
        score
    }

    fn free_tiles(&self, grid: &Grid<N>) -> f64 {
        grid.empty_cells()
            .map(|(r, c)| if r >= N / 2 && c >= N / 2 { self.weights.interior_bonus } else { 1.0 })
            .sum()
    }
}

/// Convenience: score `grid` with a one-off evaluator.
pub fn evaluate<const N: usize>(grid: &Grid<N>, weights: &HeuristicWeights) -> f64 {
    Evaluator::<N>::new(weights).evaluate(grid)
}

/// Snake weights anchored at the top-left corner.
///
/// The path runs left-to-right along row 0, right-to-left along row 1 and so on;
/// the `k`-th cell on it weighs `base^(N*N - 1 - k)`.
fn snake_matrix<const N: usize>(base: f64) -> [[f64; N]; N] {
    let top = (N * N) as i32 - 1;
    std::array::from_fn(|r| {
        std::array::from_fn(|c| {
            let step = if r % 2 == 0 { r * N + c } else { r * N + (N - 1 - c) };
            base.powi(top - step as i32)
        })
    })
}

/// Sum of every increase along rows (left to right) and columns (top to bottom).
///
/// Zero for a grid that never grows away from the top-left corner.
fn monotonicity_penalty<const N: usize>(grid: &Grid<N>) -> f64 {
    let mut penalty = 0u64;
    for i in 0..N {
        for j in 1..N {
            penalty = penalty
                .saturating_add(grid.value(i, j).saturating_sub(grid.value(i, j - 1)))
                .saturating_add(grid.value(j, i).saturating_sub(grid.value(j - 1, i)));
        }
    }
    penalty as f64
}

/// Adjacent equal non-empty pairs, horizontal and vertical, each counted once.
fn potential_merges<const N: usize>(grid: &Grid<N>) -> u32 {
    let mut merges = 0;
    for i in 0..N {
        for j in 1..N {
            let e = grid.exponent(i, j);
            if e != 0 && e == grid.exponent(i, j - 1) {
                merges += 1;
            }
            let e = grid.exponent(j, i);
            if e != 0 && e == grid.exponent(j - 1, i) {
                merges += 1;
            }
        }
    }
    merges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Board, Grid};

    #[test]
    fn snake_matrix_follows_boustrophedon() {
        let m = snake_matrix::<4>(4.0);
        assert_eq!(m[0], [4f64.powi(15), 4f64.powi(14), 4f64.powi(13), 4f64.powi(12)]);
        assert_eq!(m[1], [4f64.powi(8), 4f64.powi(9), 4f64.powi(10), 4f64.powi(11)]);
        assert_eq!(m[2], [4f64.powi(7), 4f64.powi(6), 4f64.powi(5), 4f64.powi(4)]);
        assert_eq!(m[3], [1.0, 4.0, 16.0, 64.0]);
    }

    #[test]
    fn breakdown_of_known_grid() {
        let grid = Board::from_rows([[8, 8, 0, 0], [4, 16, 0, 0], [0; 4], [0, 0, 0, 2]]).unwrap();
        let ev = Evaluator::new(&HeuristicWeights::default());
        let b = ev.breakdown(&grid);
        // Increases: row1 4->16 (12), col1 8->16 (8), row3 0->2 (2), col3 0->2 (2).
        assert_eq!(b.monotonicity, 24.0);
        assert_eq!(b.merges, 1.0);
        // 11 empty cells, 3 of them in the far quadrant at 1.5.
        assert_eq!(b.free_tiles, 8.0 + 3.0 * 1.5);
        let expected_snake = 8.0 * 4f64.powi(15) + 8.0 * 4f64.powi(14) + 4.0 * 4f64.powi(8) + 16.0 * 4f64.powi(9) + 2.0 * 64.0;
        assert_eq!(b.snake, expected_snake);
    }

    #[test]
    fn corner_anchored_grid_scores_higher() {
        let weights = HeuristicWeights::default();
        let anchored = Board::from_rows([[256, 64, 16, 4], [0; 4], [0; 4], [0; 4]]).unwrap();
        let scattered = Board::from_rows([[0; 4], [0; 4], [0; 4], [4, 16, 64, 256]]).unwrap();
        assert!(evaluate(&anchored, &weights) > evaluate(&scattered, &weights));
    }

    #[test]
    fn evaluation_is_pure() {
        let grid = Board::from_rows([[2, 4, 8, 16], [32, 64, 128, 256], [0; 4], [2, 0, 2, 0]]).unwrap();
        let snapshot = grid;
        let ev = Evaluator::new(&HeuristicWeights::default());
        assert_eq!(ev.evaluate(&grid), ev.evaluate(&grid));
        assert_eq!(grid, snapshot);
    }

    #[test]
    fn single_weight_isolates_sub_score() {
        let weights = HeuristicWeights { snake: 0.0, monotonicity: 0.0, merges: 1.0, free_tiles: 0.0, ..Default::default() };
        let grid = Board::from_rows([[2, 2, 2, 0], [2, 0, 0, 0], [0; 4], [0; 4]]).unwrap();
        assert_eq!(evaluate(&grid, &weights), 3.0);
    }

    #[test]
    fn validation() {
        assert!(HeuristicWeights::default().validate().is_ok());
        let empty = HeuristicWeights { snake: 0.0, monotonicity: 0.0, merges: 0.0, free_tiles: 0.0, ..Default::default() };
        assert_eq!(empty.validate(), Err(ConfigError::EmptyWeights));
        let nan = HeuristicWeights { merges: f64::NAN, ..Default::default() };
        assert_eq!(nan.validate(), Err(ConfigError::NonFiniteWeight("merges")));
        let base = HeuristicWeights { snake_base: 0.5, ..Default::default() };
        assert_eq!(base.validate(), Err(ConfigError::SnakeBase(0.5)));
    }

    #[test]
    fn works_on_other_sizes() {
        let grid = Grid::<3>::from_rows([[4, 2, 0], [0; 3], [0; 3]]).unwrap();
        let ev = Evaluator::new(&HeuristicWeights::default());
        let b = ev.breakdown(&grid);
        assert_eq!(b.snake, 4.0 * 4f64.powi(8) + 2.0 * 4f64.powi(7));
        assert_eq!(b.monotonicity, 0.0);
    }
}
