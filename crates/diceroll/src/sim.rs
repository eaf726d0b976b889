// ABOUTME: Monte Carlo sampling of dice expressions.
// ABOUTME: Rolls an expression many times to estimate its distribution and summary statistics.

use crate::dice::Dice;
use crate::error::Result;
use crate::roller::{FastRng, Rng};
use std::collections::HashMap;

/// Result of a Monte Carlo simulation.
#[derive(Debug, Clone)]
pub struct SimResult {
    /// Distribution of outcomes: value -> count.
    pub distribution: HashMap<i64, usize>,
    /// Minimum value observed.
    pub min: i64,
    /// Maximum value observed.
    pub max: i64,
    /// Mean (average) value.
    pub mean: f64,
    /// Standard deviation.
    pub std_dev: f64,
    /// Number of trials run.
    pub n: usize,
}

impl SimResult {
    /// Returns outcomes sorted by value for iteration.
    pub fn sorted_outcomes(&self) -> Vec<(i64, usize)> {
        let mut outcomes: Vec<_> = self.distribution.iter().map(|(&k, &v)| (k, v)).collect();
        outcomes.sort_by_key(|(k, _)| *k);
        outcomes
    }

    /// Returns the probability of each outcome.
    pub fn probabilities(&self) -> HashMap<i64, f64> {
        self.distribution
            .iter()
            .map(|(&k, &v)| (k, v as f64 / self.n as f64))
            .collect()
    }

    /// Returns the most common outcome, preferring the lowest value on ties.
    pub fn mode(&self) -> Option<i64> {
        self.sorted_outcomes()
            .into_iter()
            .rev()
            .max_by_key(|&(_, count)| count)
            .map(|(value, _)| value)
    }

    /// Returns the median value.
    pub fn median(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let value_at = |index: usize| {
            let mut seen = 0;
            for (value, count) in self.sorted_outcomes() {
                seen += count;
                if index < seen {
                    return value;
                }
            }
            self.max
        };

        let mid = self.n / 2;
        if self.n % 2 == 0 {
            (value_at(mid - 1) + value_at(mid)) as f64 / 2.0
        } else {
            value_at(mid) as f64
        }
    }
}

/// Run a Monte Carlo simulation on a dice expression.
///
/// # Arguments
/// * `expr` - The dice expression to simulate (e.g., "4d6 best of 2 | min 8")
/// * `n` - Number of trials to run
///
/// # Returns
/// A `SimResult` containing the distribution and statistics.
pub fn simulate(expr: &str, n: usize) -> Result<SimResult> {
    simulate_with_rng(expr, n, &mut FastRng::new())
}

/// Run a simulation with a seeded RNG for reproducibility.
pub fn simulate_seeded(expr: &str, n: usize, seed: u64) -> Result<SimResult> {
    simulate_with_rng(expr, n, &mut FastRng::with_seed(seed))
}

/// Run a simulation drawing faces from the given random source.
pub fn simulate_with_rng(expr: &str, n: usize, rng: &mut impl Rng) -> Result<SimResult> {
    let dice = Dice::parse(expr)?;

    let mut distribution: HashMap<i64, usize> = HashMap::new();
    let mut sum: f64 = 0.0;
    let mut sum_sq: f64 = 0.0;
    let mut min = i64::MAX;
    let mut max = i64::MIN;

    for _ in 0..n {
        let total = dice.roll(rng)?.total;

        *distribution.entry(total).or_insert(0) += 1;
        sum += total as f64;
        sum_sq += (total as f64) * (total as f64);
        min = min.min(total);
        max = max.max(total);
    }

    if n == 0 {
        return Ok(SimResult {
            distribution,
            min: 0,
            max: 0,
            mean: 0.0,
            std_dev: 0.0,
            n,
        });
    }

    let mean = sum / n as f64;
    let variance = (sum_sq / n as f64) - (mean * mean);
    let std_dev = variance.max(0.0).sqrt();
    tracing::debug!(expr, n, mean, std_dev, "simulated expression");

    Ok(SimResult {
        distribution,
        min,
        max,
        mean,
        std_dev,
        n,
    })
}
