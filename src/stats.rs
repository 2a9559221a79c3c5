use serde::Serialize;

/// Nearest-rank percentile of `values`.
///
/// Values are sorted ascending and the element at `floor(len * p / 100)`,
/// clamped to the last index, is returned. No interpolation is done. An
/// empty slice yields 0.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let index = (sorted.len() as f64 * p / 100.0).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Arithmetic mean, or 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean, minimum and maximum of a sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Spread {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl Spread {
    /// Summarizes `values`; all fields are 0 when the slice is empty.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            mean: mean(values),
            min,
            max,
        }
    }
}

/// Spread plus nearest-rank percentiles, used for response times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Distribution {
    pub fn of(values: &[f64]) -> Self {
        let spread = Spread::of(values);
        Self {
            mean: spread.mean,
            min: spread.min,
            max: spread.max,
            p50: percentile(values, 50.0),
            p95: percentile(values, 95.0),
            p99: percentile(values, 99.0),
        }
    }
}
