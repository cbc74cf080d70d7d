//! Shared helpers for the integration tests: a synthetic price series and
//! brute-force references that recompute every window from scratch.
#![allow(dead_code)]

use rollrank::utilities::data_loader::{read_frame_from_reader, Frame};
use rollrank::utilities::enums::{PctMode, RankMethod};
use rollrank::utilities::math_functions::pct_normalize;
use std::error::Error;

/// Test data holder built from a deterministic random walk.
pub struct TestData {
    pub frame: Frame<f64>,
}

impl TestData {
    /// Random walk of `n` closes with a NaN gap every `nan_every` rows
    /// (`0` disables gaps), rounded to cents so ties show up.
    pub fn random_walk(n: usize, seed: u64, nan_every: usize) -> Result<Self, Box<dyn Error>> {
        let mut csv = String::from("ts,close\n");
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        let mut price = 100.0f64;
        for i in 0..n {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let step = ((state % 201) as f64 - 100.0) / 100.0;
            price = (price + step).max(1.0);
            if nan_every > 0 && i % nan_every == nan_every - 1 {
                csv.push_str(&format!("{},\n", i));
            } else {
                csv.push_str(&format!("{},{:.2}\n", i, price));
            }
        }
        let frame = read_frame_from_reader(csv.as_bytes())?;
        Ok(TestData { frame })
    }

    pub fn close_prices(&self) -> &[f64] {
        self.frame.select_column("close").unwrap_or(&[])
    }
}

/// Window members of position `i` with NaNs dropped, in time order.
fn valid_window(data: &[f64], i: usize, window: usize) -> Vec<f64> {
    data[i + 1 - window..=i].iter().copied().filter(|v| !v.is_nan()).collect()
}

pub fn rolling_rank_reference(data: &[f64], window: usize, method: RankMethod, pct: Option<PctMode>) -> Vec<f64> {
    (0..data.len())
        .map(|i| {
            if i + 1 < window || data[i].is_nan() {
                return f64::NAN;
            }
            let v = data[i];
            let mut sorted = valid_window(data, i, window);
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let first = sorted.iter().position(|&x| x == v).unwrap();
            let last = sorted.iter().rposition(|&x| x == v).unwrap();
            let rank = match method {
                RankMethod::Min => (first + 1) as f64,
                RankMethod::Max | RankMethod::First => (last + 1) as f64,
                RankMethod::Average => (first + last + 2) as f64 / 2.0,
            };
            match pct {
                Some(mode) => pct_normalize(rank, sorted.len(), mode),
                None => rank,
            }
        })
        .collect()
}

pub fn rci_reference(data: &[f64], window: usize) -> Vec<f64> {
    (0..data.len())
        .map(|i| {
            if i + 1 < window || data[i].is_nan() {
                return f64::NAN;
            }
            let win = valid_window(data, i, window);
            if win.len() < 2 {
                return 0.0;
            }
            let mut order: Vec<usize> = (0..win.len()).collect();
            order.sort_by(|&a, &b| win[a].partial_cmp(&win[b]).unwrap());
            let mut ranks = vec![0.0; win.len()];
            for (r, &idx) in order.iter().enumerate() {
                ranks[idx] = (r + 1) as f64;
            }
            let times: Vec<f64> = (0..win.len()).map(|t| t as f64).collect();
            pearson(&times, &ranks)
        })
        .collect()
}

/// Textbook Pearson coefficient; `NaN` when either side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return f64::NAN;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (&a, &b) in x[..n].iter().zip(&y[..n]) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    sxy / (sxx * syy).sqrt()
}

/// Compare two arrays with a tolerance
pub fn assert_array_close(actual: &[f64], expected: &[f64], rtol: f64, atol: f64, name: &str) {
    assert_eq!(actual.len(), expected.len(),
        "{}: Length mismatch: actual {} vs expected {}", name, actual.len(), expected.len());

    for (i, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        if a.is_nan() && e.is_nan() {
            continue;
        }

        let diff = (a - e).abs();
        let tol = atol + rtol * e.abs();

        assert!(diff <= tol,
            "{}: Value mismatch at index {}: actual {} vs expected {} (diff: {}, tol: {})",
            name, i, a, e, diff, tol);
    }
}

/// Element-wise bit equality, NaN included.
pub fn assert_bits_equal(a: &[f64], b: &[f64], name: &str) {
    assert_eq!(a.len(), b.len(), "{}: Length mismatch", name);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert_eq!(x.to_bits(), y.to_bits(), "{}: differs at index {}: {} vs {}", name, i, x, y);
    }
}
