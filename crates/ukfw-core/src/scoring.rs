//! Pluggable confidence scoring.
//!
//! Stage confidence is a design placeholder, not a measurement: each stage
//! samples from a documented range (see `ExpertArchetype::confidence_range`
//! and the planner/synthesizer constants in the pipeline). The seam exists so
//! tests can pin scores deterministically.

use rand::Rng;

/// Samples a confidence score from `[lo, hi]`. Implementations must stay
/// inside the requested bounds.
pub trait ConfidenceSampler: Send + Sync {
    fn sample(&self, lo: f64, hi: f64) -> f64;
}

/// Production sampler: uniform over the requested range.
pub struct RandomSampler;

impl ConfidenceSampler for RandomSampler {
    fn sample(&self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        rand::thread_rng().gen_range(lo..=hi)
    }
}

/// Test sampler: always returns the midpoint of the range.
pub struct FixedSampler;

impl ConfidenceSampler for FixedSampler {
    fn sample(&self, lo: f64, hi: f64) -> f64 {
        (lo + hi) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_sampler_stays_in_bounds() {
        let s = RandomSampler;
        for _ in 0..100 {
            let v = s.sample(0.8, 0.98);
            assert!((0.8..=0.98).contains(&v));
        }
    }

    #[test]
    fn fixed_sampler_is_midpoint() {
        let s = FixedSampler;
        assert!((s.sample(0.8, 1.0) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn degenerate_range_returns_lo() {
        let s = RandomSampler;
        assert_eq!(s.sample(0.3, 0.3), 0.3);
    }
}
