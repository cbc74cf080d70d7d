//! Boundary adapters: everything a caller hands in is turned into a
//! contiguous `&[T]` (`T` = `f32` or `f64`, NaN as the missing-value marker)
//! before any kernel runs.

use csv::ReaderBuilder;
use num_traits::{Float, ToPrimitive};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Debug;
use std::fs::File;
use std::io::Read;

/// Element types the kernels rank directly.
///
/// Comparisons happen in the native width; only the output is `f64`.
pub trait RankValue: Float + Debug + Send + Sync + 'static {}

impl RankValue for f32 {}

impl RankValue for f64 {}

/// Copies an integer, bool-like or float column into an `f64` buffer.
///
/// Entries that do not fit an `f64` become NaN.
pub fn widen_to_f64<I, V>(values: I) -> Vec<f64>
where
	I: IntoIterator<Item = V>,
	V: ToPrimitive,
{
	values
		.into_iter()
		.map(|v| v.to_f64().unwrap_or(f64::NAN))
		.collect()
}

pub fn widen_bools(values: &[bool]) -> Vec<f64> {
	values.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()
}

/// Named numeric columns of equal length.
#[derive(Debug, Clone)]
pub struct Frame<T = f64> {
	names: Vec<String>,
	columns: Vec<Vec<T>>,
	index: HashMap<String, usize>,
}

impl<T: RankValue> Frame<T> {
	pub fn new() -> Self {
		Self {
			names: Vec::new(),
			columns: Vec::new(),
			index: HashMap::new(),
		}
	}

	/// Adds or replaces a column. Every column must have the same length.
	pub fn with_column(mut self, name: &str, values: Vec<T>) -> Result<Self, Box<dyn Error>> {
		if let Some(first) = self.columns.first() {
			if first.len() != values.len() {
				return Err(format!(
					"column `{}` has {} rows, frame has {}",
					name,
					values.len(),
					first.len()
				)
				.into());
			}
		}
		match self.index.get(name) {
			Some(&idx) => self.columns[idx] = values,
			None => {
				self.index.insert(name.to_string(), self.columns.len());
				self.names.push(name.to_string());
				self.columns.push(values);
			}
		}
		Ok(self)
	}

	pub fn len(&self) -> usize {
		self.columns.first().map_or(0, Vec::len)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn column_names(&self) -> &[String] {
		&self.names
	}

	/// Column lookup used by the `*Data::Frame` input variants.
	#[inline]
	pub fn column(&self, name: &str) -> Option<&[T]> {
		self.index.get(name).map(|&idx| self.columns[idx].as_slice())
	}

	pub fn select_column(&self, name: &str) -> Result<&[T], Box<dyn Error>> {
		self.column(name)
			.ok_or_else(|| format!("Invalid column: {}", name).into())
	}
}

impl<T: RankValue> Default for Frame<T> {
	fn default() -> Self {
		Self::new()
	}
}

/// Parses a CSV table with a header row into a [`Frame`].
///
/// Empty cells and `nan`/`NaN` parse as NaN.
pub fn read_frame_from_reader<R: Read>(reader: R) -> Result<Frame<f64>, Box<dyn Error>> {
	let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
	let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
	let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

	for result in rdr.records() {
		let record = result?;
		for (col, cell) in columns.iter_mut().zip(record.iter()) {
			col.push(parse_cell(cell)?);
		}
	}

	let mut frame = Frame::new();
	for (name, col) in headers.iter().zip(columns) {
		frame = frame.with_column(name, col)?;
	}
	Ok(frame)
}

pub fn read_frame_from_csv(file_path: &str) -> Result<Frame<f64>, Box<dyn Error>> {
	let file = File::open(file_path)?;
	read_frame_from_reader(file)
}

fn parse_cell(cell: &str) -> Result<f64, Box<dyn Error>> {
	let cell = cell.trim();
	if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
		return Ok(f64::NAN);
	}
	Ok(cell.parse::<f64>()?)
}
