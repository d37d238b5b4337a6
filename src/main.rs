use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ai_2048_solver::config::Settings;
use ai_2048_solver::engine::{Board, GameState, Status};
use ai_2048_solver::search::{Algorithm, Expectimax, Search, Searcher, StrategyConfig};
use ai_2048_solver::solver::Solver;
use ai_2048_solver::trace::{self, Run};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "ai-2048-solver", about = "2048 autoplay with minimax and expectimax")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,

    /// Only log warnings and suppress the status line
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Autoplay one 4x4 game
    Play {
        /// TOML settings file; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum)]
        algorithm: Option<AlgorithmArg>,
        /// Search depth in full turns
        #[arg(long)]
        depth: Option<i64>,
        /// Seed for tile spawns (random when absent)
        #[arg(long)]
        seed: Option<u64>,
        /// Stop after this many moves
        #[arg(long)]
        steps: Option<u64>,
        /// Wall-clock budget per move, in milliseconds
        #[arg(long)]
        time_ms: Option<u64>,
        /// Node budget per move
        #[arg(long)]
        nodes: Option<u64>,
        /// Write a binary trace of the run to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Recommend a move for a grid given as 16 comma-separated tile values, row by row
    Hint {
        #[arg(long)]
        grid: String,
        #[arg(long, value_enum, default_value_t = AlgorithmArg::Expectimax)]
        algorithm: AlgorithmArg,
        #[arg(long, default_value_t = 3)]
        depth: i64,
    },
    /// Summarize a trace written by `play --out`
    Inspect {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    Minimax,
    Expectimax,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(a: AlgorithmArg) -> Self {
        match a {
            AlgorithmArg::Minimax => Algorithm::Minimax,
            AlgorithmArg::Expectimax => Algorithm::Expectimax,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.quiet);
    match args.cmd {
        Cmd::Play { config, algorithm, depth, seed, steps, time_ms, nodes, out } => {
            let mut settings = match config {
                Some(path) => Settings::load(&path).with_context(|| format!("loading {}", path.display()))?,
                None => Settings::default(),
            };
            if let Some(a) = algorithm { settings.strategy.algorithm = a.into(); }
            if let Some(d) = depth { settings.strategy.max_depth = d; }
            if seed.is_some() { settings.run.seed = seed; }
            if steps.is_some() { settings.run.max_steps = steps; }
            if time_ms.is_some() { settings.run.time_budget_ms = time_ms; }
            if nodes.is_some() { settings.run.node_budget = nodes; }
            play(&settings, args.quiet, out)
        }
        Cmd::Hint { grid, algorithm, depth } => hint(&grid, algorithm.into(), depth),
        Cmd::Inspect { path } => inspect(&path),
    }
}

fn init_tracing(quiet: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn play(settings: &Settings, quiet: bool, out: Option<PathBuf>) -> Result<()> {
    let cfg = settings.strategy()?;
    let seed = settings.run.seed.unwrap_or_else(rand::random);
    info!(seed, algorithm = %cfg.algorithm(), depth = cfg.max_depth(), "starting game");

    let mut solver = Solver::new(cfg.clone()).with_budget(settings.budget());
    if let Some(limit) = settings.run.max_steps {
        solver = solver.with_max_steps(limit);
    }
    let engine_str = format!("{} d{}", cfg.algorithm(), solver.depth());

    let pb = if quiet { ProgressBar::hidden() } else { ProgressBar::new_spinner() };
    pb.set_style(
        ProgressStyle::with_template("{spinner} {elapsed_precise} | Moves: {msg}")?
            .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let start = Instant::now();
    let start_wall = trace::now_unix_seconds();
    let mut rng = StdRng::seed_from_u64(seed);
    let initial: GameState<4> = GameState::initial(&mut rng);
    let report = solver.run_with(initial, &mut rng, |step| {
        if step.index % 10 == 0 {
            let rate = step.index as f64 / start.elapsed().as_secs_f64().max(1e-6);
            pb.set_message(format!("{} | moves/sec: {:.1} | score: {}", step.index, rate, step.state.score()));
        }
    });
    pb.finish_and_clear();
    let elapsed = start.elapsed().as_secs_f64().max(1e-6);

    println!("{}", report.final_state.grid());
    println!(
        "Outcome: {} | moves: {} | moves/sec: {:.1} | score: {} | highest tile: {} | nodes: {}",
        report.outcome,
        report.steps(),
        report.steps() as f64 / elapsed,
        report.final_state.score(),
        report.highest_tile(),
        report.nodes
    );

    if let Some(path) = out {
        let run = Run::from_report(&report, start_wall, elapsed as f32, Some(engine_str));
        trace::write_run_to_path(&path, &run).with_context(|| format!("writing trace {}", path.display()))?;
        info!(path = %path.display(), "trace written");
    }
    Ok(())
}

fn parse_grid(text: &str) -> Result<Board> {
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<u64>().with_context(|| format!("bad tile value {v:?}")))
        .collect::<Result<Vec<_>>>()?;
    Ok(Board::from_values(&values)?)
}

fn hint(grid: &str, algorithm: Algorithm, depth: i64) -> Result<()> {
    let board = parse_grid(grid)?;
    let cfg = StrategyConfig::new(algorithm, depth, Default::default())?;
    println!("{board}");
    let state = GameState::new(board, 0);
    match state.status() {
        Status::Won => bail!("grid is already won"),
        Status::Over => bail!("no legal move: game over"),
        Status::Continue => {}
    }
    let depth = cfg.max_depth().max(1);
    if algorithm == Algorithm::Expectimax {
        let mut ex = Expectimax::new(cfg.weights().clone()).with_prob_cutoff(cfg.prob_cutoff());
        for b in ex.branch_evals(board, depth) {
            if b.legal {
                println!("{:>5}: {:.1}", b.dir, b.ev);
            } else {
                println!("{:>5}: illegal", b.dir);
            }
        }
    }
    let mut searcher = Searcher::from_config(&cfg);
    let found = searcher.search(board, depth);
    match found.best_move {
        Some(dir) => println!("Best move: {dir} (value {:.1}, {} nodes)", found.value, searcher.last_stats().nodes),
        None => bail!("no legal move"),
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let run = trace::parse_run_file(path).with_context(|| format!("reading trace {}", path.display()))?;
    let m = &run.meta;
    let outcome = run.outcome().map(|o| o.to_string()).unwrap_or_else(|| "unknown".to_string());
    println!("Engine: {}", m.engine_str.as_deref().unwrap_or("-"));
    println!("Grid: {n}x{n} | outcome: {outcome} | steps: {}", m.steps, n = m.grid_size);
    println!("Score: {} | highest tile: {} | elapsed: {:.2}s | started: {}", m.final_score, m.highest_tile, m.elapsed_s, m.start_unix_s);
    let last = m.steps as usize;
    match m.grid_size {
        3 => println!("{}", run.grid::<3>(last)?),
        4 => println!("{}", run.grid::<4>(last)?),
        5 => println!("{}", run.grid::<5>(last)?),
        6 => println!("{}", run.grid::<6>(last)?),
        n => println!("(no renderer for {n}x{n} grids)"),
    }
    Ok(())
}
