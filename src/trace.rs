//! Binary trace of a finished autoplay run.
//!
//! Layout (little-endian): header, engine string, `steps + 1` grids of `N*N` exponent
//! bytes, `steps + 1` scores, `steps` move codes, CRC32C of everything before it.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::engine::{Grid, Move};
use crate::solver::{Outcome, Report};

const MAGIC: &[u8; 4] = b"A2S1"; // ASCII magic
const VERSION: u8 = 1;
const ENDIAN_LE: u8 = 0; // 0 = little-endian

// 4 magic + 1 version + 1 endian + 1 size + 1 outcome + 4 steps + 8 start + 4 elapsed
// + 8 final score + 8 highest tile + 2 engine_len
const HEADER_LEN: usize = 4 + 1 + 1 + 1 + 1 + 4 + 8 + 4 + 8 + 8 + 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub grid_size: u8,
    pub outcome: u8,
    pub steps: u32,
    pub start_unix_s: u64,
    pub elapsed_s: f32,
    pub final_score: u64,
    pub highest_tile: u64,
    pub engine_str: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub meta: Meta,
    pub grids: Vec<u8>,  // length = (steps + 1) * N * N
    pub scores: Vec<u64>, // length = steps + 1
    pub moves: Vec<u8>,  // length = steps
}

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid magic or version")]
    MagicOrVersion,
    #[error("unsupported endianness")]
    Endianness,
    #[error("file too short or malformed")]
    Malformed,
    #[error("checksum mismatch")]
    Checksum,
}

impl Run {
    /// Capture a solver report. `engine_str` names the strategy that played it.
    pub fn from_report<const N: usize>(
        report: &Report<N>,
        start_unix_s: u64,
        elapsed_s: f32,
        engine_str: Option<String>,
    ) -> Self {
        let grids = report.states.iter().flat_map(|g| g.to_exponents()).collect();
        let moves = report.moves.iter().map(|&m| m as u8).collect();
        let meta = Meta {
            grid_size: N as u8,
            outcome: report.outcome.code(),
            steps: report.moves.len() as u32,
            start_unix_s,
            elapsed_s,
            final_score: report.final_state.score(),
            highest_tile: report.highest_tile(),
            engine_str,
        };
        Run { meta, grids, scores: report.scores.clone(), moves }
    }

    pub fn outcome(&self) -> Option<Outcome> { Outcome::from_code(self.meta.outcome) }

    /// Grid after `index` moves (0 is the starting grid).
    pub fn grid<const N: usize>(&self, index: usize) -> Result<Grid<N>, TraceError> {
        if self.meta.grid_size as usize != N {
            return Err(TraceError::Malformed);
        }
        let cells = N * N;
        let start = index.checked_mul(cells).ok_or(TraceError::Malformed)?;
        let bytes = self.grids.get(start..start + cells).ok_or(TraceError::Malformed)?;
        Grid::from_exponents(bytes).map_err(|_| TraceError::Malformed)
    }

    pub fn move_at(&self, index: usize) -> Option<Move> {
        self.moves.get(index).copied().and_then(Move::from_u8)
    }

    fn cells(&self) -> usize { self.meta.grid_size as usize * self.meta.grid_size as usize }
}

#[inline]
fn read_u16_le(bytes: &[u8]) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(..2)?.try_into().ok()?))
}

#[inline]
fn read_u32_le(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?))
}

#[inline]
fn read_u64_le(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(bytes.get(..8)?.try_into().ok()?))
}

#[inline]
fn read_f32_le(bytes: &[u8]) -> Option<f32> {
    read_u32_le(bytes).map(f32::from_bits)
}

pub fn encode_run(run: &Run) -> Result<Vec<u8>, TraceError> {
    let meta = &run.meta;
    let steps = meta.steps as usize;
    // Validate lengths consistent
    if meta.grid_size == 0
        || run.grids.len() != (steps + 1) * run.cells()
        || run.scores.len() != steps + 1
        || run.moves.len() != steps
    {
        return Err(TraceError::Malformed);
    }

    let engine_bytes = meta.engine_str.as_deref().map(str::as_bytes).unwrap_or(&[]);
    let engine_len: u16 = engine_bytes.len().try_into().map_err(|_| TraceError::Malformed)?;

    let payload_len = engine_bytes.len() + run.grids.len() + run.scores.len() * 8 + run.moves.len();
    let mut buf = Vec::with_capacity(HEADER_LEN + payload_len + 4);

    // Header
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.push(ENDIAN_LE);
    buf.push(meta.grid_size);
    buf.push(meta.outcome);
    buf.extend_from_slice(&meta.steps.to_le_bytes());
    buf.extend_from_slice(&meta.start_unix_s.to_le_bytes());
    buf.extend_from_slice(&meta.elapsed_s.to_bits().to_le_bytes());
    buf.extend_from_slice(&meta.final_score.to_le_bytes());
    buf.extend_from_slice(&meta.highest_tile.to_le_bytes());
    buf.extend_from_slice(&engine_len.to_le_bytes());

    // Variable metadata
    buf.extend_from_slice(engine_bytes);

    // Payload: grids, scores LE u64, then moves u8
    buf.extend_from_slice(&run.grids);
    for &s in &run.scores { buf.extend_from_slice(&s.to_le_bytes()); }
    buf.extend_from_slice(&run.moves);

    // Trailer: CRC32C of all preceding bytes
    let checksum = crc32c::crc32c(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

pub fn write_run_to_path<P: AsRef<Path>>(path: P, run: &Run) -> Result<(), TraceError> {
    let data = encode_run(run)?;
    let mut f = fs::File::create(path)?;
    f.write_all(&data)?;
    Ok(())
}

pub fn parse_run_bytes(bytes: &[u8]) -> Result<Run, TraceError> {
    if bytes.len() < HEADER_LEN + 4 { // header + checksum at minimum (no payload)
        return Err(TraceError::Malformed);
    }

    // Validate checksum first to avoid panics while reading fields
    let (content, trailer) = bytes.split_at(bytes.len() - 4);
    let file_crc = read_u32_le(trailer).ok_or(TraceError::Malformed)?;
    if file_crc != crc32c::crc32c(content) { return Err(TraceError::Checksum); }

    // Fixed header
    if &content[..4] != MAGIC || content[4] != VERSION { return Err(TraceError::MagicOrVersion); }
    if content[5] != ENDIAN_LE { return Err(TraceError::Endianness); }
    let grid_size = content[6];
    let outcome = content[7];
    if grid_size == 0 || Outcome::from_code(outcome).is_none() { return Err(TraceError::Malformed); }

    let mut off = 8;
    let steps = read_u32_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 4;
    let start_unix_s = read_u64_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 8;
    let elapsed_s = read_f32_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 4;
    let final_score = read_u64_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 8;
    let highest_tile = read_u64_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 8;
    let engine_len = read_u16_le(&content[off..]).ok_or(TraceError::Malformed)? as usize; off += 2;

    let engine_bytes = content.get(off..off + engine_len).ok_or(TraceError::Malformed)?;
    off += engine_len;
    let engine_str = if engine_len > 0 { std::str::from_utf8(engine_bytes).ok().map(str::to_string) } else { None };

    let states = steps as usize + 1;
    let cells = grid_size as usize * grid_size as usize;
    let grids_len = states.checked_mul(cells).ok_or(TraceError::Malformed)?;
    let scores_len = states.checked_mul(8).ok_or(TraceError::Malformed)?;
    let moves_len = steps as usize;

    if content.len() != off + grids_len + scores_len + moves_len {
        return Err(TraceError::Malformed);
    }

    let grids = content[off..off + grids_len].to_vec();
    off += grids_len;
    let scores = content[off..off + scores_len]
        .chunks_exact(8)
        .map(|c| read_u64_le(c).ok_or(TraceError::Malformed))
        .collect::<Result<Vec<_>, _>>()?;
    off += scores_len;
    let moves = content[off..off + moves_len].to_vec();
    if moves.iter().any(|&m| Move::from_u8(m).is_none()) {
        return Err(TraceError::Malformed);
    }

    let meta = Meta { grid_size, outcome, steps, start_unix_s, elapsed_s, final_score, highest_tile, engine_str };
    Ok(Run { meta, grids, scores, moves })
}

pub fn parse_run_file<P: AsRef<Path>>(path: P) -> Result<Run, TraceError> {
    let data = fs::read(path)?;
    parse_run_bytes(&data)
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
