use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Execution strategy for a call.
///
/// `Serial` runs the whole sequence as a single chunk on the calling thread,
/// `Parallel` splits it into chunks on the rayon pool. The `*Batch` variants
/// select how the rows of a parameter sweep are scheduled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Kernel {
	Auto,
	Serial,
	Parallel,
	SerialBatch,
	ParallelBatch,
}

impl Default for Kernel {
	fn default() -> Self {
		Kernel::Auto
	}
}

impl Kernel {
	#[inline(always)]
	pub const fn is_batch(self) -> bool {
		matches!(self, Kernel::SerialBatch | Kernel::ParallelBatch)
	}

	#[inline(always)]
	pub const fn is_parallel(self) -> bool {
		matches!(self, Kernel::Parallel | Kernel::ParallelBatch)
	}
}

/// How ties among equal values collapse into a single rank.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankMethod {
	Average,
	Min,
	Max,
	First,
}

impl Default for RankMethod {
	fn default() -> Self {
		RankMethod::Average
	}
}

impl RankMethod {
	pub const fn as_str(self) -> &'static str {
		match self {
			RankMethod::Average => "average",
			RankMethod::Min => "min",
			RankMethod::Max => "max",
			RankMethod::First => "first",
		}
	}
}

/// Percentile normalization applied to a raw rank.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PctMode {
	/// `rank / m`
	Pandas,
	/// `(rank - 1) / (m - 1)`, `0.5` when `m == 1`
	Closed,
}

impl Default for PctMode {
	fn default() -> Self {
		PctMode::Pandas
	}
}

impl PctMode {
	pub const fn as_str(self) -> &'static str {
		match self {
			PctMode::Pandas => "pandas",
			PctMode::Closed => "closed",
		}
	}
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseEnumError {
	#[error("unknown rank method `{0}` (expected average, min, max or first)")]
	RankMethod(String),
	#[error("unknown pct mode `{0}` (expected pandas or closed)")]
	PctMode(String),
}

impl FromStr for RankMethod {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"average" => Ok(RankMethod::Average),
			"min" => Ok(RankMethod::Min),
			"max" => Ok(RankMethod::Max),
			"first" => Ok(RankMethod::First),
			other => Err(ParseEnumError::RankMethod(other.to_string())),
		}
	}
}

impl FromStr for PctMode {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pandas" => Ok(PctMode::Pandas),
			"closed" => Ok(PctMode::Closed),
			other => Err(ParseEnumError::PctMode(other.to_string())),
		}
	}
}

impl fmt::Display for RankMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl fmt::Display for PctMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Where a position sits relative to its window.
///
/// Positions before `window - 1` never produce a value, whatever their NaN
/// content: there is not enough history for a full window yet.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WindowState {
	WarmingUp,
	Ready,
}

impl WindowState {
	#[inline(always)]
	pub const fn at(idx: usize, window: usize) -> Self {
		if idx + 1 < window {
			WindowState::WarmingUp
		} else {
			WindowState::Ready
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_rank_method_tokens() {
		for m in [RankMethod::Average, RankMethod::Min, RankMethod::Max, RankMethod::First] {
			assert_eq!(m.as_str().parse::<RankMethod>().unwrap(), m);
		}
		assert_eq!(
			"dense".parse::<RankMethod>(),
			Err(ParseEnumError::RankMethod("dense".to_string()))
		);
		assert_eq!(RankMethod::default(), RankMethod::Average);
	}

	#[test]
	fn test_pct_mode_tokens() {
		assert_eq!("pandas".parse::<PctMode>().unwrap(), PctMode::Pandas);
		assert_eq!("closed".parse::<PctMode>().unwrap(), PctMode::Closed);
		assert!("Closed".parse::<PctMode>().is_err());
		assert_eq!(PctMode::default(), PctMode::Pandas);
	}

	#[test]
	fn test_window_state() {
		assert_eq!(WindowState::at(0, 1), WindowState::Ready);
		assert_eq!(WindowState::at(0, 3), WindowState::WarmingUp);
		assert_eq!(WindowState::at(1, 3), WindowState::WarmingUp);
		assert_eq!(WindowState::at(2, 3), WindowState::Ready);
	}

	#[test]
	fn test_kernel_flags() {
		assert!(Kernel::ParallelBatch.is_batch());
		assert!(Kernel::ParallelBatch.is_parallel());
		assert!(!Kernel::Serial.is_parallel());
		assert!(!Kernel::Auto.is_batch());
	}
}
