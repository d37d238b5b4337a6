//! ai-2048-solver: a 2048 game engine with alpha-beta minimax and expectimax players
//!
//! This crate provides:
//! - A generic `Grid<N>` (`Board = Grid<4>`) with pure moves, spawns and terminal checks (`engine`)
//! - `GameState`/`Game` wrapping a grid, its score and a seeded spawn RNG (`engine`)
//! - A weighted heuristic evaluator and two search strategies behind one `Search` trait (`search`)
//! - An autoplay driver reporting the score trajectory and outcome (`solver`)
//! - TOML settings (`config`) and a binary trace format for finished runs (`trace`)
//!
//! Quick start:
//! ```
//! use ai_2048_solver::engine::{Board, Move};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let s = b0.shift(Move::Left);
//! assert_eq!(s.grid.tile_sum(), b0.tile_sum());
//! ```
//!
//! Recommend a move
//! ```
//! use ai_2048_solver::engine::{Board, GameState};
//! use ai_2048_solver::search::{recommend_move, StrategyConfig};
//!
//! let grid = Board::from_rows([[2, 2, 4, 8], [0; 4], [0; 4], [0; 4]]).unwrap();
//! let state = GameState::new(grid, 0);
//! let mv = recommend_move(&state, &StrategyConfig::minimax(3).unwrap());
//! assert!(mv.is_some());
//! ```
//!
//! Full loop (simplest possible)
//! ```
//! use ai_2048_solver::engine::{Game, Status};
//! use ai_2048_solver::search::{Expectimax, HeuristicWeights, Search};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // 1) Seeded game and policy
//! let mut game: Game<_, 4> = Game::new(StdRng::seed_from_u64(123));
//! let mut policy = Expectimax::new(HeuristicWeights::default());
//! let mut moves = 0u32;
//!
//! // 2) Loop a couple of moves to demonstrate flow (keep doctests fast)
//! while game.status() == Status::Continue && moves < 4 {
//!     match policy.best_move(game.current_state().grid(), 1) {
//!         Some(dir) => { game.apply_move(dir); moves += 1; }
//!         None => break,
//!     }
//! }
//! assert!(moves > 0);
//! ```
//!
pub mod config;
pub mod engine;
pub mod search;
pub mod solver;
pub mod trace;
