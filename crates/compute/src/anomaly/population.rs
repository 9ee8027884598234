//! Population statistics for one metric column.

/// Spread below this fraction of the mean's magnitude counts as zero.
pub const RELATIVE_EPSILON: f64 = 1e-9;

/// Population mean and standard deviation (divide by n).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationStats {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

impl PopulationStats {
    /// No spread, relative to the mean's magnitude.
    pub fn is_degenerate(&self) -> bool {
        self.std_dev <= RELATIVE_EPSILON * self.mean.abs().max(1.0)
    }

    /// Signed distance from the mean in standard deviations.
    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }
}

/// Two-pass mean/variance over the finite values of a column.
/// Returns `None` when there is nothing to measure.
pub fn compute_population_stats(values: &[f64]) -> Option<PopulationStats> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }

    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;

    Some(PopulationStats {
        mean,
        std_dev: variance.sqrt(),
        count: finite.len(),
    })
}
