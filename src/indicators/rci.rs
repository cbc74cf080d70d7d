//! # Rank Correlation Index (RCI)
//!
//! Spearman-style correlation between the time order of the valid members of
//! each trailing window and their value order. Members are ranked with a
//! stable ordering: equal values rank in the order they arrived. `+1` means the
//! window rises monotonically, `-1` that it falls monotonically.
//!
//! Arrival-order ties differ from the classic RCI formula, which gives equal
//! values a shared rank: a flat window such as `[0.1, 0.1]` scores `1.0` here
//! rather than `0.0`.
//!
//! ## Parameters
//! - **window**: Number of positions per window (defaults to 14).
//!
//! ## Errors
//! - **InvalidWindow**: `window` is zero.
//! - **UnknownColumn**: a frame input names a column the frame does not have.
//! - **EmptyWindowRange**: a batch sweep expands to no windows.
//! - **InvalidKernelForBatch**: a single-series kernel was passed to a batch call.
//!
//! ## Returns
//! - `Ok(RciOutput)` with one value per input position:
//!   NaN while warming up or when the current value is NaN, `0.0` when fewer
//!   than two valid members remain, otherwise a value in `[-1, 1]`.
//! - `Err(RciError)` otherwise.

use crate::utilities::data_loader::{Frame, RankValue};
use crate::utilities::enums::{Kernel, WindowState};
use crate::utilities::helpers::{detect_best_batch_kernel, run_chunked};
use crate::utilities::math_functions::permutation_correlation;
use crate::utilities::order_stat::{FenwickTree, OrderStatTree, ValueDomain, NAN_SLOT};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone)]
pub enum RciData<'a, T = f64> {
	Frame { frame: &'a Frame<T>, column: &'a str },
	Slice(&'a [T]),
}

#[derive(Debug, Clone)]
pub struct RciOutput {
	pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RciParams {
	pub window: Option<usize>,
}

impl Default for RciParams {
	fn default() -> Self {
		Self { window: Some(14) }
	}
}

#[derive(Debug, Clone)]
pub struct RciInput<'a, T = f64> {
	pub data: RciData<'a, T>,
	pub params: RciParams,
}

impl<'a, T: RankValue> RciInput<'a, T> {
	#[inline]
	pub fn from_frame(frame: &'a Frame<T>, column: &'a str, params: RciParams) -> Self {
		Self {
			data: RciData::Frame { frame, column },
			params,
		}
	}
	#[inline]
	pub fn from_slice(slice: &'a [T], params: RciParams) -> Self {
		Self {
			data: RciData::Slice(slice),
			params,
		}
	}
	#[inline]
	pub fn with_default_frame(frame: &'a Frame<T>) -> Self {
		Self::from_frame(frame, "close", RciParams::default())
	}
	#[inline]
	pub fn source(&self) -> Result<&'a [T], RciError> {
		match &self.data {
			RciData::Slice(slice) => Ok(*slice),
			RciData::Frame { frame, column } => frame
				.column(column)
				.ok_or_else(|| RciError::UnknownColumn { column: column.to_string() }),
		}
	}
	#[inline]
	pub fn get_window(&self) -> usize {
		self.params.window.unwrap_or(14)
	}
}

#[derive(Copy, Clone, Debug, Default)]
pub struct RciBuilder {
	window: Option<usize>,
	kernel: Kernel,
	jobs: Option<usize>,
}

impl RciBuilder {
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
	pub fn kernel(mut self, k: Kernel) -> Self {
		self.kernel = k;
		self
	}
	#[inline(always)]
	pub fn jobs(mut self, n: usize) -> Self {
		self.jobs = Some(n);
		self
	}
	#[inline(always)]
	pub fn apply(self, frame: &Frame<f64>) -> Result<RciOutput, RciError> {
		let input = RciInput::from_frame(frame, "close", RciParams { window: self.window });
		rci_with_jobs(&input, self.kernel, self.jobs)
	}
	#[inline(always)]
	pub fn apply_slice<T: RankValue>(self, data: &[T]) -> Result<RciOutput, RciError> {
		let input = RciInput::from_slice(data, RciParams { window: self.window });
		rci_with_jobs(&input, self.kernel, self.jobs)
	}
}

#[derive(Debug, Error)]
pub enum RciError {
	#[error("rci: Invalid window: window = {window}, must be at least 1")]
	InvalidWindow { window: usize },
	#[error("rci: Unknown column `{column}` in frame")]
	UnknownColumn { column: String },
	#[error("rci: Window range expands to nothing: start = {start}, end = {end}, step = {step}")]
	EmptyWindowRange { start: usize, end: usize, step: usize },
	#[error("rci: Kernel {0:?} cannot drive a batch sweep")]
	InvalidKernelForBatch(Kernel),
}

#[inline]
pub fn rci<T: RankValue>(input: &RciInput<T>) -> Result<RciOutput, RciError> {
	rci_with_kernel(input, Kernel::Auto)
}

#[inline]
pub fn rci_with_kernel<T: RankValue>(input: &RciInput<T>, kernel: Kernel) -> Result<RciOutput, RciError> {
	rci_with_jobs(input, kernel, None)
}

pub fn rci_with_jobs<T: RankValue>(
	input: &RciInput<T>,
	kernel: Kernel,
	jobs: Option<usize>,
) -> Result<RciOutput, RciError> {
	let window = input.get_window();
	if window == 0 {
		return Err(RciError::InvalidWindow { window });
	}
	let data = input.source()?;
	let mut out = vec![f64::NAN; data.len()];
	run_chunked(data, window, kernel, jobs, &mut out, |ctx, skip, dst| {
		rci_scalar(ctx, window, skip, dst)
	});
	Ok(RciOutput { values: out })
}

/// Plain entry point; `parallel = false` runs a single serial pass.
pub fn rank_correlation_index<T: RankValue>(data: &[T], window: usize, parallel: bool) -> Result<Vec<f64>, RciError> {
	let kernel = if parallel { Kernel::Auto } else { Kernel::Serial };
	let input = RciInput::from_slice(data, RciParams { window: Some(window) });
	Ok(rci_with_kernel(&input, kernel)?.values)
}

/// Running `S = sum(rank * time)` over the valid members of a window.
///
/// Every valid element gets a stamp, its index among the valid elements of
/// the chunk. Members always hold the consecutive stamps
/// `base..base + len`, so a member's time inside the window is
/// `stamp - base`. Counts and stamp sums share the same value slots.
struct RankTimeSum {
	counts: OrderStatTree,
	stamps: FenwickTree,
	base: i64,
	sum: i128,
}

impl RankTimeSum {
	fn with_slots(slots: usize) -> Self {
		Self {
			counts: OrderStatTree::with_slots(slots),
			stamps: FenwickTree::new(slots),
			base: 0,
			sum: 0,
		}
	}

	#[inline(always)]
	fn len(&self) -> usize {
		self.counts.len()
	}

	/// Appends a new newest member. It ranks after every member `<=` it, and
	/// every strictly greater member moves up one rank.
	#[inline]
	fn push(&mut self, slot: usize) {
		let m = self.counts.len() as i64;
		let less_equal = self.counts.count_less_equal(slot) as i64;
		let rank = less_equal + 1;
		let above = m - less_equal;
		let above_time = (self.stamps.total() - self.stamps.prefix(slot + 1)) - above * self.base;
		self.sum += (rank * m + above_time) as i128;

		self.counts.insert(slot);
		self.stamps.add(slot, self.base + m);
	}

	/// Drops the oldest member, which sits at time 0 and ranks first among its
	/// equals. Every member ranked above it moves down one rank, then every
	/// remaining time shifts down by one.
	#[inline]
	fn pop_oldest(&mut self, slot: usize) {
		let m = self.counts.len() as i64;
		let less = self.counts.count_less(slot) as i64;
		let above = m - less - 1;
		let above_time = (self.stamps.total() - self.stamps.prefix(slot) - self.base) - above * self.base;
		self.sum -= above_time as i128;

		self.counts.evict(slot);
		self.stamps.add(slot, -self.base);
		let rest = (m - 1) as i128;
		self.sum -= rest * (rest + 1) / 2;
		self.base += 1;
	}

	#[inline(always)]
	fn correlation(&self) -> f64 {
		permutation_correlation(self.sum, self.len())
	}
}

/// Slides one window over `data`, writing positions `skip..` into `out`.
/// Context handling matches `rolling_rank_scalar`.
pub fn rci_scalar<T: RankValue>(data: &[T], window: usize, skip: usize, out: &mut [f64]) {
	debug_assert_eq!(data.len(), skip + out.len());
	let domain = ValueDomain::from_values(data);
	let slots = domain.slots_for(data);
	let mut state = RankTimeSum::with_slots(domain.len());

	for (i, &slot) in slots.iter().enumerate() {
		if i >= window {
			let old = slots[i - window];
			if old != NAN_SLOT {
				state.pop_oldest(old);
			}
		}
		if slot != NAN_SLOT {
			state.push(slot);
		}
		if i < skip {
			continue;
		}

		out[i - skip] = match WindowState::at(i, window) {
			WindowState::WarmingUp => f64::NAN,
			WindowState::Ready if slot == NAN_SLOT => f64::NAN,
			WindowState::Ready => state.correlation(),
		};
	}
}

// --- Batch support ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RciBatchRange {
	pub window: (usize, usize, usize),
}

impl Default for RciBatchRange {
	fn default() -> Self {
		Self { window: (9, 52, 1) }
	}
}

#[derive(Clone, Debug, Default)]
pub struct RciBatchBuilder {
	range: RciBatchRange,
	kernel: Kernel,
}

impl RciBatchBuilder {
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
	pub fn apply_slice<T: RankValue>(self, data: &[T]) -> Result<RciBatchOutput, RciError> {
		rci_batch_with_kernel(data, &self.range, self.kernel)
	}
	pub fn with_default_slice<T: RankValue>(data: &[T], k: Kernel) -> Result<RciBatchOutput, RciError> {
		RciBatchBuilder::new().kernel(k).apply_slice(data)
	}
	pub fn apply_frame(self, frame: &Frame<f64>, column: &str) -> Result<RciBatchOutput, RciError> {
		let data = frame
			.column(column)
			.ok_or_else(|| RciError::UnknownColumn { column: column.to_string() })?;
		self.apply_slice(data)
	}
}

#[derive(Clone, Debug)]
pub struct RciBatchOutput {
	pub values: Vec<f64>,
	pub combos: Vec<RciParams>,
	pub rows: usize,
	pub cols: usize,
}

impl RciBatchOutput {
	pub fn row_for_params(&self, p: &RciParams) -> Option<usize> {
		self.combos
			.iter()
			.position(|c| c.window.unwrap_or(14) == p.window.unwrap_or(14))
	}
	pub fn values_for(&self, p: &RciParams) -> Option<&[f64]> {
		self.row_for_params(p).map(|row| {
			let start = row * self.cols;
			&self.values[start..start + self.cols]
		})
	}
}

#[inline(always)]
fn expand_grid(r: &RciBatchRange) -> Vec<RciParams> {
	let (start, end, step) = r.window;
	let windows: Vec<usize> = if step == 0 || start == end {
		vec![start]
	} else {
		(start..=end).step_by(step).collect()
	};
	windows.into_iter().map(|w| RciParams { window: Some(w) }).collect()
}

#[inline(always)]
pub fn rci_batch_slice<T: RankValue>(data: &[T], sweep: &RciBatchRange) -> Result<RciBatchOutput, RciError> {
	rci_batch_inner(data, sweep, false)
}

#[inline(always)]
pub fn rci_batch_par_slice<T: RankValue>(data: &[T], sweep: &RciBatchRange) -> Result<RciBatchOutput, RciError> {
	rci_batch_inner(data, sweep, true)
}

fn rci_batch_inner<T: RankValue>(data: &[T], sweep: &RciBatchRange, parallel: bool) -> Result<RciBatchOutput, RciError> {
	let combos = expand_grid(sweep);
	if combos.is_empty() {
		let (start, end, step) = sweep.window;
		return Err(RciError::EmptyWindowRange { start, end, step });
	}
	if combos.iter().any(|c| c.window == Some(0)) {
		return Err(RciError::InvalidWindow { window: 0 });
	}
	let rows = combos.len();
	let cols = data.len();
	let mut values = vec![f64::NAN; rows * cols];
	if cols == 0 {
		return Ok(RciBatchOutput { values, combos, rows, cols });
	}

	let do_row = |row: usize, out_row: &mut [f64]| {
		rci_scalar(data, combos[row].window.unwrap_or(14), 0, out_row);
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
	Ok(RciBatchOutput { values, combos, rows, cols })
}

pub fn rci_batch_with_kernel<T: RankValue>(data: &[T], sweep: &RciBatchRange, k: Kernel) -> Result<RciBatchOutput, RciError> {
	let kernel = match k {
		Kernel::Auto => detect_best_batch_kernel(),
		other if other.is_batch() => other,
		other => return Err(RciError::InvalidKernelForBatch(other)),
	};
	match kernel {
		Kernel::ParallelBatch => rci_batch_par_slice(data, sweep),
		_ => rci_batch_slice(data, sweep),
	}
}
