#![allow(clippy::needless_range_loop)]

pub mod indicators;
pub mod utilities;

pub use indicators::{rank_correlation_index, rolling_rank_slice};
pub use utilities::enums::{Kernel, PctMode, RankMethod};
