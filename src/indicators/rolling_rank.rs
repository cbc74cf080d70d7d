//! # Rolling Rank
//!
//! Rank of each value among the most recent `window` observations, with
//! pandas-compatible tie methods and optional percentile output. NaNs inside
//! a window are skipped (`na_option = 'keep'`), a NaN current value yields NaN.
//!
//! ## Parameters
//! - **window**: Number of positions per window (defaults to 14).
//! - **method**: Tie handling, one of `average`, `min`, `max`, `first` (defaults to `average`).
//! - **pct**: Emit a percentile instead of the raw 1-based rank (defaults to `false`).
//! - **pct_mode**: `pandas` (`rank / m`) or `closed` (`(rank - 1) / (m - 1)`), where `m`
//!   counts the non-NaN members of the window (defaults to `pandas`).
//!
//! ## Errors
//! - **InvalidWindow**: `window` is zero.
//! - **UnknownRankMethod** / **UnknownPctMode**: an unrecognized `method` or `pct_mode` string.
//! - **UnknownColumn**: a frame input names a column the frame does not have.
//! - **EmptyWindowRange**: a batch sweep expands to no windows.
//! - **InvalidKernelForBatch**: a single-series kernel was passed to a batch call.
//!
//! ## Returns
//! - `Ok(RollingRankOutput)` with a `Vec<f64>` matching the input length. The first
//!   `window - 1` entries are always NaN.
//! - `Err(RollingRankError)` otherwise.

use crate::utilities::data_loader::{Frame, RankValue};
use crate::utilities::enums::{Kernel, ParseEnumError, PctMode, RankMethod, WindowState};
use crate::utilities::helpers::{detect_best_batch_kernel, run_chunked};
use crate::utilities::math_functions::pct_normalize;
use crate::utilities::order_stat::{OrderStatTree, ValueDomain, NAN_SLOT};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// -- Data Structures --

#[derive(Debug, Clone)]
pub enum RollingRankData<'a, T = f64> {
	Frame { frame: &'a Frame<T>, column: &'a str },
	Slice(&'a [T]),
}

#[derive(Debug, Clone)]
pub struct RollingRankOutput {
	pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingRankParams {
	pub window: Option<usize>,
	pub method: Option<RankMethod>,
	pub pct: Option<bool>,
	pub pct_mode: Option<PctMode>,
}

impl Default for RollingRankParams {
	fn default() -> Self {
		Self {
			window: Some(14),
			method: Some(RankMethod::Average),
			pct: Some(false),
			pct_mode: Some(PctMode::Pandas),
		}
	}
}

#[derive(Debug, Clone)]
pub struct RollingRankInput<'a, T = f64> {
	pub data: RollingRankData<'a, T>,
	pub params: RollingRankParams,
}

impl<'a, T: RankValue> RollingRankInput<'a, T> {
	#[inline]
	pub fn from_frame(frame: &'a Frame<T>, column: &'a str, params: RollingRankParams) -> Self {
		Self {
			data: RollingRankData::Frame { frame, column },
			params,
		}
	}
	#[inline]
	pub fn from_slice(slice: &'a [T], params: RollingRankParams) -> Self {
		Self {
			data: RollingRankData::Slice(slice),
			params,
		}
	}
	#[inline]
	pub fn with_default_frame(frame: &'a Frame<T>) -> Self {
		Self::from_frame(frame, "close", RollingRankParams::default())
	}
	/// Values to rank; fails when a frame lacks the named column.
	#[inline]
	pub fn source(&self) -> Result<&'a [T], RollingRankError> {
		match &self.data {
			RollingRankData::Slice(slice) => Ok(*slice),
			RollingRankData::Frame { frame, column } => frame
				.column(column)
				.ok_or_else(|| RollingRankError::UnknownColumn { column: column.to_string() }),
		}
	}
	#[inline]
	pub fn get_window(&self) -> usize {
		self.params.window.unwrap_or(14)
	}
	#[inline]
	pub fn get_method(&self) -> RankMethod {
		self.params.method.unwrap_or_default()
	}
	#[inline]
	pub fn get_pct(&self) -> bool {
		self.params.pct.unwrap_or(false)
	}
	#[inline]
	pub fn get_pct_mode(&self) -> PctMode {
		self.params.pct_mode.unwrap_or_default()
	}
}

// -- Builder --

#[derive(Copy, Clone, Debug, Default)]
pub struct RollingRankBuilder {
	window: Option<usize>,
	method: Option<RankMethod>,
	pct: Option<bool>,
	pct_mode: Option<PctMode>,
	kernel: Kernel,
	jobs: Option<usize>,
}

impl RollingRankBuilder {
	#[inline(always)]
	pub fn new() -> Self {
		Self::default()
	}
	#[inline(always)]
	pub fn window(mut self, n: usize) -> Self {
		self.window = Some(n);
		self
	}
	#[inline(always)]
	pub fn method(mut self, m: RankMethod) -> Self {
		self.method = Some(m);
		self
	}
	#[inline(always)]
	pub fn pct(mut self, on: bool) -> Self {
		self.pct = Some(on);
		self
	}
	#[inline(always)]
	pub fn pct_mode(mut self, mode: PctMode) -> Self {
		self.pct_mode = Some(mode);
		self
	}
	#[inline(always)]
	pub fn kernel(mut self, k: Kernel) -> Self {
		self.kernel = k;
		self
	}
	/// Fixes the number of chunks; `1` forces a single serial pass.
	#[inline(always)]
	pub fn jobs(mut self, n: usize) -> Self {
		self.jobs = Some(n);
		self
	}
	#[inline(always)]
	fn params(&self) -> RollingRankParams {
		RollingRankParams {
			window: self.window,
			method: self.method,
			pct: self.pct,
			pct_mode: self.pct_mode,
		}
	}
	#[inline(always)]
	pub fn apply(self, frame: &Frame<f64>) -> Result<RollingRankOutput, RollingRankError> {
		let input = RollingRankInput::from_frame(frame, "close", self.params());
		rolling_rank_with_jobs(&input, self.kernel, self.jobs)
	}
	#[inline(always)]
	pub fn apply_slice<T: RankValue>(self, data: &[T]) -> Result<RollingRankOutput, RollingRankError> {
		let input = RollingRankInput::from_slice(data, self.params());
		rolling_rank_with_jobs(&input, self.kernel, self.jobs)
	}
}

// -- Errors --

#[derive(Debug, Error)]
pub enum RollingRankError {
	#[error("rolling_rank: Invalid window: window = {window}, must be at least 1")]
	InvalidWindow { window: usize },
	#[error("rolling_rank: Unknown rank method `{token}` (expected average, min, max or first)")]
	UnknownRankMethod { token: String },
	#[error("rolling_rank: Unknown pct mode `{token}` (expected pandas or closed)")]
	UnknownPctMode { token: String },
	#[error("rolling_rank: Unknown column `{column}` in frame")]
	UnknownColumn { column: String },
	#[error("rolling_rank: Window range expands to nothing: start = {start}, end = {end}, step = {step}")]
	EmptyWindowRange { start: usize, end: usize, step: usize },
	#[error("rolling_rank: Kernel {0:?} cannot drive a batch sweep")]
	InvalidKernelForBatch(Kernel),
}

impl From<ParseEnumError> for RollingRankError {
	fn from(e: ParseEnumError) -> Self {
		match e {
			ParseEnumError::RankMethod(token) => RollingRankError::UnknownRankMethod { token },
			ParseEnumError::PctMode(token) => RollingRankError::UnknownPctMode { token },
		}
	}
}

// -- Indicator functions --

#[inline]
pub fn rolling_rank<T: RankValue>(input: &RollingRankInput<T>) -> Result<RollingRankOutput, RollingRankError> {
	rolling_rank_with_kernel(input, Kernel::Auto)
}

#[inline]
pub fn rolling_rank_with_kernel<T: RankValue>(
	input: &RollingRankInput<T>,
	kernel: Kernel,
) -> Result<RollingRankOutput, RollingRankError> {
	rolling_rank_with_jobs(input, kernel, None)
}

pub fn rolling_rank_with_jobs<T: RankValue>(
	input: &RollingRankInput<T>,
	kernel: Kernel,
	jobs: Option<usize>,
) -> Result<RollingRankOutput, RollingRankError> {
	let window = input.get_window();
	if window == 0 {
		return Err(RollingRankError::InvalidWindow { window });
	}
	let data = input.source()?;
	let method = input.get_method();
	let pct = input.get_pct();
	let pct_mode = input.get_pct_mode();

	let mut out = vec![f64::NAN; data.len()];
	run_chunked(data, window, kernel, jobs, &mut out, |ctx, skip, dst| {
		rolling_rank_scalar(ctx, window, skip, method, pct, pct_mode, dst)
	});
	Ok(RollingRankOutput { values: out })
}

/// String-token entry point: `method` is one of `average`, `min`, `max`,
/// `first`; `pct_mode` is `pandas` or `closed`. `parallel = false` runs a
/// single serial pass.
pub fn rolling_rank_slice<T: RankValue>(
	data: &[T],
	window: usize,
	method: &str,
	pct: bool,
	pct_mode: &str,
	parallel: bool,
) -> Result<Vec<f64>, RollingRankError> {
	let method: RankMethod = method.parse()?;
	let pct_mode: PctMode = pct_mode.parse()?;
	let kernel = if parallel { Kernel::Auto } else { Kernel::Serial };
	let params = RollingRankParams {
		window: Some(window),
		method: Some(method),
		pct: Some(pct),
		pct_mode: Some(pct_mode),
	};
	let input = RollingRankInput::from_slice(data, params);
	Ok(rolling_rank_with_kernel(&input, kernel)?.values)
}

/// Slides one window over `data`, writing positions `skip..` into `out`.
///
/// `data[..skip]` is context that only primes the window. Local index `i`
/// is warming up while `i < window - 1`; callers pass either the full
/// sequence (`skip` = chunk start) or exactly `window - 1` context positions,
/// so the local test matches the global one.
pub fn rolling_rank_scalar<T: RankValue>(
	data: &[T],
	window: usize,
	skip: usize,
	method: RankMethod,
	pct: bool,
	pct_mode: PctMode,
	out: &mut [f64],
) {
	debug_assert_eq!(data.len(), skip + out.len());
	let domain = ValueDomain::from_values(data);
	let slots = domain.slots_for(data);
	let mut tree = OrderStatTree::with_slots(domain.len());

	for (i, &slot) in slots.iter().enumerate() {
		if i >= window {
			let old = slots[i - window];
			if old != NAN_SLOT {
				tree.evict(old);
			}
		}
		if slot != NAN_SLOT {
			tree.insert(slot);
		}
		if i < skip {
			continue;
		}

		out[i - skip] = match WindowState::at(i, window) {
			WindowState::WarmingUp => f64::NAN,
			WindowState::Ready if slot == NAN_SLOT => f64::NAN,
			WindowState::Ready => {
				let rank = tree.rank(slot, method);
				if pct {
					pct_normalize(rank, tree.len(), pct_mode)
				} else {
					rank
				}
			}
		};
	}
}

// --- Batch support ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RollingRankBatchRange {
	pub window: (usize, usize, usize),
	pub method: RankMethod,
	pub pct: bool,
	pub pct_mode: PctMode,
}

impl Default for RollingRankBatchRange {
	fn default() -> Self {
		Self {
			window: (14, 60, 1),
			method: RankMethod::Average,
			pct: false,
			pct_mode: PctMode::Pandas,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct RollingRankBatchBuilder {
	range: RollingRankBatchRange,
	kernel: Kernel,
}

impl RollingRankBatchBuilder {
	pub fn new() -> Self {
		Self::default()
	}
	pub fn kernel(mut self, k: Kernel) -> Self {
		self.kernel = k;
		self
	}
	#[inline]
	pub fn window_range(mut self, start: usize, end: usize, step: usize) -> Self {
		self.range.window = (start, end, step);
		self
	}
	#[inline]
	pub fn window_static(mut self, w: usize) -> Self {
		self.range.window = (w, w, 0);
		self
	}
	#[inline]
	pub fn method(mut self, m: RankMethod) -> Self {
		self.range.method = m;
		self
	}
	#[inline]
	pub fn pct(mut self, on: bool, mode: PctMode) -> Self {
		self.range.pct = on;
		self.range.pct_mode = mode;
		self
	}
	pub fn apply_slice<T: RankValue>(self, data: &[T]) -> Result<RollingRankBatchOutput, RollingRankError> {
		rolling_rank_batch_with_kernel(data, &self.range, self.kernel)
	}
	pub fn with_default_slice<T: RankValue>(data: &[T], k: Kernel) -> Result<RollingRankBatchOutput, RollingRankError> {
		RollingRankBatchBuilder::new().kernel(k).apply_slice(data)
	}
	pub fn apply_frame(self, frame: &Frame<f64>, column: &str) -> Result<RollingRankBatchOutput, RollingRankError> {
		let data = frame
			.column(column)
			.ok_or_else(|| RollingRankError::UnknownColumn { column: column.to_string() })?;
		self.apply_slice(data)
	}
}

#[derive(Clone, Debug)]
pub struct RollingRankBatchOutput {
	pub values: Vec<f64>,
	pub combos: Vec<RollingRankParams>,
	pub rows: usize,
	pub cols: usize,
}

impl RollingRankBatchOutput {
	pub fn row_for_params(&self, p: &RollingRankParams) -> Option<usize> {
		self.combos
			.iter()
			.position(|c| c.window.unwrap_or(14) == p.window.unwrap_or(14))
	}
	pub fn values_for(&self, p: &RollingRankParams) -> Option<&[f64]> {
		self.row_for_params(p).map(|row| {
			let start = row * self.cols;
			&self.values[start..start + self.cols]
		})
	}
}

#[inline(always)]
fn expand_grid(r: &RollingRankBatchRange) -> Vec<RollingRankParams> {
	fn axis_usize((start, end, step): (usize, usize, usize)) -> Vec<usize> {
		if step == 0 || start == end {
			return vec![start];
		}
		(start..=end).step_by(step).collect()
	}
	axis_usize(r.window)
		.into_iter()
		.map(|w| RollingRankParams {
			window: Some(w),
			method: Some(r.method),
			pct: Some(r.pct),
			pct_mode: Some(r.pct_mode),
		})
		.collect()
}

#[inline(always)]
pub fn rolling_rank_batch_slice<T: RankValue>(
	data: &[T],
	sweep: &RollingRankBatchRange,
) -> Result<RollingRankBatchOutput, RollingRankError> {
	rolling_rank_batch_inner(data, sweep, false)
}

#[inline(always)]
pub fn rolling_rank_batch_par_slice<T: RankValue>(
	data: &[T],
	sweep: &RollingRankBatchRange,
) -> Result<RollingRankBatchOutput, RollingRankError> {
	rolling_rank_batch_inner(data, sweep, true)
}

fn rolling_rank_batch_inner<T: RankValue>(
	data: &[T],
	sweep: &RollingRankBatchRange,
	parallel: bool,
) -> Result<RollingRankBatchOutput, RollingRankError> {
	let combos = expand_grid(sweep);
	if combos.is_empty() {
		let (start, end, step) = sweep.window;
		return Err(RollingRankError::EmptyWindowRange { start, end, step });
	}
	if let Some(bad) = combos.iter().find(|c| c.window == Some(0)) {
		return Err(RollingRankError::InvalidWindow {
			window: bad.window.unwrap_or(0),
		});
	}
	let rows = combos.len();
	let cols = data.len();
	let mut values = vec![f64::NAN; rows * cols];
	if cols == 0 {
		return Ok(RollingRankBatchOutput { values, combos, rows, cols });
	}

	let do_row = |row: usize, out_row: &mut [f64]| {
		let window = combos[row].window.unwrap_or(14);
		rolling_rank_scalar(data, window, 0, sweep.method, sweep.pct, sweep.pct_mode, out_row);
	};
	if parallel {
		values
			.par_chunks_mut(cols)
			.enumerate()
			.for_each(|(row, slice)| do_row(row, slice));
	} else {
		for (row, slice) in values.chunks_mut(cols).enumerate() {
			do_row(row, slice);
		}
	}
	Ok(RollingRankBatchOutput { values, combos, rows, cols })
}

pub fn rolling_rank_batch_with_kernel<T: RankValue>(
	data: &[T],
	sweep: &RollingRankBatchRange,
	k: Kernel,
) -> Result<RollingRankBatchOutput, RollingRankError> {
	let kernel = match k {
		Kernel::Auto => detect_best_batch_kernel(),
		other if other.is_batch() => other,
		other => return Err(RollingRankError::InvalidKernelForBatch(other)),
	};
	match kernel {
		Kernel::ParallelBatch => rolling_rank_batch_par_slice(data, sweep),
		_ => rolling_rank_batch_slice(data, sweep),
	}
}
