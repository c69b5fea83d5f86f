//! Cost estimation for spatial decomposition

use tessera_core::Region;

/// Estimates the computational cost of a region.
///
/// The decomposer treats estimates as opaque, non-negative numbers.
pub trait CostEstimator: Send + Sync {
    fn estimate(&self, region: &Region) -> f64;
}

impl<F> CostEstimator for F
where
    F: Fn(&Region) -> f64 + Send + Sync,
{
    fn estimate(&self, region: &Region) -> f64 {
        self(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_estimator() {
        let by_width = |r: &Region| r.width as f64;
        let estimator: &dyn CostEstimator = &by_width;
        assert_eq!(estimator.estimate(&Region::new(0, 0, 7, 3)), 7.0);
    }
}
