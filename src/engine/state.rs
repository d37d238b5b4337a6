use rand::Rng;

use super::{Grid, Move};

/// Derived status of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Continue,
    /// A tile reached [`super::WIN_TILE`]. Takes precedence over `Over`.
    Won,
    /// No direction changes the grid.
    Over,
}

/// Read-only snapshot of a game: the grid plus the accumulated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameState<const N: usize> {
    grid: Grid<N>,
    score: u64,
}

impl<const N: usize> GameState<N> {
    /// Wrap an existing grid and score.
    pub fn new(grid: Grid<N>, score: u64) -> Self { Self { grid, score } }

    /// Fresh game: two random spawns on an empty grid, score 0.
    pub fn initial<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let grid = Grid::EMPTY.with_random_tile(rng).with_random_tile(rng);
        Self { grid, score: 0 }
    }

    #[inline]
    pub fn grid(&self) -> Grid<N> { self.grid }

    #[inline]
    pub fn score(&self) -> u64 { self.score }

    pub fn status(&self) -> Status {
        if self.grid.is_win() {
            Status::Won
        } else if self.grid.is_game_over() {
            Status::Over
        } else {
            Status::Continue
        }
    }

    /// Perform a move then insert a random tile if the move changed the grid.
    ///
    /// An illegal move returns the identical state: no spawn, no score change.
    ///
    /// ```
    /// use ai_2048_solver::engine::{Board, GameState, Move};
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(1);
    /// let grid = Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let next = GameState::new(grid, 0).perform_move(Move::Left, &mut rng);
    /// assert_eq!(next.score(), 4);
    /// assert_eq!(next.grid().value(0, 0), 4);
    /// ```
    pub fn perform_move<R: Rng + ?Sized>(self, dir: Move, rng: &mut R) -> Self {
        let shift = self.grid.shift(dir);
        if !shift.changed {
            return self;
        }
        Self { grid: shift.grid.with_random_tile(rng), score: self.score.saturating_add(shift.score_delta) }
    }

    /// Legal moves in the order Left, Right, Up, Down.
    pub fn available_moves(&self) -> Vec<Move> { self.grid.available_moves() }
}

/// A live game: the current state plus the seeded RNG that drives tile spawns.
///
/// The RNG is only ever advanced here; solvers work on grids and never touch it.
pub struct Game<R, const N: usize> {
    state: GameState<N>,
    rng: R,
}

impl<R: Rng, const N: usize> Game<R, N> {
    /// Start a new game with two random tiles.
    ///
    /// ```
    /// use ai_2048_solver::engine::{Game, Status};
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let game: Game<_, 4> = Game::new(StdRng::seed_from_u64(7));
    /// assert_eq!(game.current_state().grid().count_empty(), 14);
    /// assert_eq!(game.current_state().status(), Status::Continue);
    /// ```
    pub fn new(mut rng: R) -> Self {
        let state = GameState::initial(&mut rng);
        Self { state, rng }
    }

    /// Resume from an existing state.
    pub fn from_state(state: GameState<N>, rng: R) -> Self { Self { state, rng } }

    #[inline]
    pub fn current_state(&self) -> GameState<N> { self.state }

    /// Apply `dir` and return the updated state (unchanged when the move is illegal).
    pub fn apply_move(&mut self, dir: Move) -> GameState<N> {
        self.state = self.state.perform_move(dir, &mut self.rng);
        self.state
    }

    pub fn available_moves(&self) -> Vec<Move> { self.state.available_moves() }

    pub fn status(&self) -> Status { self.state.status() }
}
