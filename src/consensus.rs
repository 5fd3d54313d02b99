//! Consensus rules and constants
//!
//! Everything here must be identical for every node on a chain:
//! - block reward and coinbase maturity
//! - block weight limits
//! - header version hard-fork schedule
//! - difficulty retargeting
//! - sorted-by-hash ordering of serialized collections

use log::trace;
use thiserror::Error;

use crate::core::hash::Hashed;
use crate::core::ser;
use crate::core::target::Difficulty;

// =============================================================================
// Reward
// =============================================================================

/// Base units in one coin
pub const COIN: u64 = 1_000_000_000;

/// Fixed block reward
pub const REWARD: u64 = 50 * COIN;

/// Blocks a coinbase output must wait before it can be spent
pub const COINBASE_MATURITY: u64 = 1_000;

/// Coinbase value for a block collecting `fee`: the reward plus the half
/// of the fees that is not burned
pub fn reward(fee: u64) -> u64 {
    REWARD.saturating_add(fee / 2)
}

// =============================================================================
// Weight
// =============================================================================

pub const BLOCK_INPUT_WEIGHT: usize = 1;
pub const BLOCK_OUTPUT_WEIGHT: usize = 10;
pub const BLOCK_KERNEL_WEIGHT: usize = 2;

/// Total weight a block may carry
pub const MAX_BLOCK_WEIGHT: usize = 80_000;

/// Most inputs a single transaction may have: a full block less the
/// weight of one output and one kernel
pub const MAX_BLOCK_INPUTS: usize = MAX_BLOCK_WEIGHT - BLOCK_OUTPUT_WEIGHT - BLOCK_KERNEL_WEIGHT;

/// Weight of a set of inputs, outputs and kernels
pub fn block_weight(input_len: usize, output_len: usize, kernel_len: usize) -> usize {
    input_len * BLOCK_INPUT_WEIGHT
        + output_len * BLOCK_OUTPUT_WEIGHT
        + kernel_len * BLOCK_KERNEL_WEIGHT
}

pub fn exceeds_weight(input_len: usize, output_len: usize, kernel_len: usize) -> bool {
    block_weight(input_len, output_len, kernel_len) > MAX_BLOCK_WEIGHT
}

// =============================================================================
// Header versions
// =============================================================================

/// Blocks between scheduled hard forks
pub const HARD_FORK_INTERVAL: u64 = 250_000;

/// Header version a block at `height` must carry. Past the last scheduled
/// fork any version at least that high is accepted.
pub fn header_version(height: u64) -> u16 {
    match height / HARD_FORK_INTERVAL {
        0 => 1,
        1 => 2,
        2 => 3,
        _ => 4,
    }
}

pub fn valid_header_version(height: u64, version: u16) -> bool {
    let expected = header_version(height);
    if expected == 4 {
        version >= expected
    } else {
        version == expected
    }
}

// =============================================================================
// Difficulty
// =============================================================================

/// Target seconds between blocks
pub const BLOCK_TIME_SEC: u64 = 60;

/// Blocks whose difficulties are averaged for a retarget
pub const DIFFICULTY_ADJUST_WINDOW: u64 = 23;

/// Blocks whose timestamps are reduced to a median
pub const MEDIAN_TIME_WINDOW: u64 = 11;

/// Expected span of one adjustment window, in seconds
pub const BLOCK_TIME_WINDOW: u64 = DIFFICULTY_ADJUST_WINDOW * BLOCK_TIME_SEC;

/// Clamp on the damped window span
pub const UPPER_TIME_BOUND: u64 = BLOCK_TIME_WINDOW * 4 / 3;
pub const LOWER_TIME_BOUND: u64 = BLOCK_TIME_WINDOW * 5 / 6;

pub const MINIMUM_DIFFICULTY: u64 = 10;

/// Failure to read the history a retarget needs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Difficulty target error: {0}")]
pub struct TargetError(pub String);

/// Difficulty for the next block, given `(timestamp, difficulty)` pairs
/// of previous blocks, newest first.
///
/// The first `DIFFICULTY_ADJUST_WINDOW` entries are averaged; the median
/// timestamp of the newest `MEDIAN_TIME_WINDOW` of them is compared with
/// the median of the `MEDIAN_TIME_WINDOW` entries right after the window.
/// The span between the two medians is damped towards the target and
/// clamped before scaling the average difficulty.
pub fn next_difficulty<T>(cursor: T) -> Result<Difficulty, TargetError>
where
    T: IntoIterator<Item = Result<(u64, Difficulty), TargetError>>,
{
    let mut window_begin = Vec::with_capacity(MEDIAN_TIME_WINDOW as usize);
    let mut window_end = Vec::with_capacity(MEDIAN_TIME_WINDOW as usize);
    let mut diff_sum: u128 = 0;

    for (n, item) in cursor.into_iter().enumerate() {
        let n = n as u64;
        if n >= DIFFICULTY_ADJUST_WINDOW + MEDIAN_TIME_WINDOW {
            break;
        }
        let (ts, diff) = item?;
        if n < DIFFICULTY_ADJUST_WINDOW {
            diff_sum += diff.into_num() as u128;
            if n < MEDIAN_TIME_WINDOW {
                window_begin.push(ts);
            }
        } else {
            window_end.push(ts);
        }
    }

    if (window_end.len() as u64) < MEDIAN_TIME_WINDOW {
        trace!(
            "not enough history for retarget ({} of {} end timestamps)",
            window_end.len(),
            MEDIAN_TIME_WINDOW
        );
        return Ok(Difficulty::minimum());
    }

    window_begin.sort_unstable();
    window_end.sort_unstable();
    let begin_ts = window_begin[window_begin.len() / 2] as i128;
    let end_ts = window_end[window_end.len() / 2] as i128;

    let ts_damp = (3 * BLOCK_TIME_WINDOW as i128 + (begin_ts - end_ts)) / 4;
    let adj_ts = ts_damp.clamp(LOWER_TIME_BOUND as i128, UPPER_TIME_BOUND as i128) as u128;

    let diff_avg = diff_sum / DIFFICULTY_ADJUST_WINDOW as u128;
    let next = diff_avg * BLOCK_TIME_WINDOW as u128 / adj_ts;
    let next = u64::try_from(next).unwrap_or(u64::MAX).max(MINIMUM_DIFFICULTY);

    trace!(
        "retarget: avg {} span {} (damped {}) -> {}",
        diff_avg,
        begin_ts - end_ts,
        adj_ts,
        next
    );
    Ok(Difficulty::from_num(next))
}

// =============================================================================
// Ordering
// =============================================================================

/// Collections that must be sorted by the hash of their elements
pub trait VerifySortOrder<T> {
    fn verify_sort_order(&self) -> Result<(), ser::Error>;
}

impl<T: Hashed> VerifySortOrder<T> for Vec<T> {
    fn verify_sort_order(&self) -> Result<(), ser::Error> {
        let hashes: Vec<_> = self.iter().map(|item| item.hash()).collect();
        if hashes.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(ser::Error::BadlySorted);
        }
        Ok(())
    }
}
