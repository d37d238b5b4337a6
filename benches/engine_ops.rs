use ai_2048_solver::engine::{Board, GameState, Move};
use ai_2048_solver::search::{Evaluator, HeuristicWeights};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut boards = Vec::new();
    // Empty and two-tile starts
    boards.push(Board::EMPTY);
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    // Derive a variety of densities deterministically
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..40 {
        let s = b.shift(seq[i % seq.len()]);
        if s.changed { b = s.grid.with_random_tile(&mut rng); }
        boards.push(b);
    }
    boards
}

fn bench_shift(c: &mut Criterion) {
    let boards = corpus();
    for dir in Move::ALL {
        c.bench_function(&format!("shift/{dir}"), |bch| {
            bch.iter(|| {
                let mut acc = 0u64;
                for &bd in &boards { acc = acc.wrapping_add(bd.shift(dir).score_delta); }
                black_box(acc)
            })
        });
    }
}

fn bench_checks(c: &mut Criterion) {
    let boards = corpus();
    c.bench_function("grid/is_game_over", |bch| {
        bch.iter(|| boards.iter().filter(|b| b.is_game_over()).count())
    });
    c.bench_function("grid/available_moves", |bch| {
        bch.iter(|| boards.iter().map(|b| b.available_moves().len()).sum::<usize>())
    });
    let ev = Evaluator::<4>::new(&HeuristicWeights::default());
    c.bench_function("heuristic/evaluate", |bch| {
        bch.iter(|| {
            let mut acc = 0f64;
            for bd in &boards { acc += ev.evaluate(bd); }
            black_box(acc)
        })
    });
}

fn bench_perform_move(c: &mut Criterion) {
    c.bench_function("grid/with_random_tile", |bch| {
        bch.iter_batched(
            || (Board::EMPTY, StdRng::seed_from_u64(7)),
            |(mut bd, mut rng)| {
                for _ in 0..16 { bd = bd.with_random_tile(&mut rng); }
                black_box(bd)
            },
            BatchSize::SmallInput,
        )
    });
    c.bench_function("state/perform_move_cycle", |bch| {
        bch.iter_batched(
            || {
                let mut rng = StdRng::seed_from_u64(9);
                (GameState::<4>::initial(&mut rng), rng)
            },
            |(mut st, mut rng)| {
                for i in 0..64 { st = st.perform_move(Move::ALL[i % 4], &mut rng); }
                black_box(st)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(engine_ops, bench_shift, bench_checks, bench_perform_move);
criterion_main!(engine_ops);
