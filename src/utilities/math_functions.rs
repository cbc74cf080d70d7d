use crate::utilities::enums::PctMode;

/// Maps a 1-based rank among `m` valid members onto a percentile.
#[inline(always)]
pub fn pct_normalize(rank: f64, m: usize, mode: PctMode) -> f64 {
	match mode {
		PctMode::Pandas => rank / m as f64,
		PctMode::Closed => {
			if m == 1 {
				0.5
			} else {
				(rank - 1.0) / (m - 1) as f64
			}
		}
	}
}

/// Pearson correlation between time positions `0..m` and a permutation of
/// ranks `1..=m`, given `s = sum(rank_j * time_j)`.
///
/// Both sides have mean-centred variance `m(m^2 - 1) / 12`, which collapses
/// the coefficient to `(12 s - 3 m (m^2 - 1)) / (m (m^2 - 1))`. Returns `0.0`
/// for `m < 2`.
#[inline(always)]
pub fn permutation_correlation(s: i128, m: usize) -> f64 {
	if m < 2 {
		return 0.0;
	}
	let m = m as i128;
	let spread = m * (m * m - 1);
	let num = 12 * s - 3 * spread;
	num as f64 / spread as f64
}

/// Textbook Pearson coefficient; `NaN` when either side has zero variance.
/// Reference for the closed form above.
#[cfg(test)]
pub(crate) fn pearson(x: &[f64], y: &[f64]) -> f64 {
	let n = x.len().min(y.len());
	if n == 0 {
		return f64::NAN;
	}
	let inv_n = 1.0 / n as f64;
	let mean_x = x[..n].iter().sum::<f64>() * inv_n;
	let mean_y = y[..n].iter().sum::<f64>() * inv_n;
	let mut sxy = 0.0;
	let mut sxx = 0.0;
	let mut syy = 0.0;
	for (&a, &b) in x[..n].iter().zip(&y[..n]) {
		let dx = a - mean_x;
		let dy = b - mean_y;
		sxy += dx * dy;
		sxx += dx * dx;
		syy += dy * dy;
	}
	sxy / (sxx * syy).sqrt()
}
