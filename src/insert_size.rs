// Online insert-size distribution estimate
//
// Welford-style running mean and variance over observed proper-pair
// distances. Each worker owns its estimator; callers that want one global
// distribution aggregate outside the core.

/// Running estimate of the mate-pair insert size distribution
#[derive(Clone, Debug)]
pub struct InsertSizeDistribution {
    pub sample_size: f32,
    pub mu: f32,
    pub sigma: f32,
    v: f32,
    sse: f32,
}

impl Default for InsertSizeDistribution {
    fn default() -> Self {
        InsertSizeDistribution {
            sample_size: 1.0,
            mu: 300.0,
            sigma: 100.0,
            v: 10_000.0,
            sse: 10_000.0,
        }
    }
}

impl InsertSizeDistribution {
    /// Add a new observation. Distances of 2000 or more are discarded as
    /// non-proper outliers.
    pub fn update(&mut self, dist: i32) {
        if dist >= 2000 {
            return;
        }
        let e = dist as f32 - self.mu;
        self.mu += e / self.sample_size;
        self.sse += e * (dist as f32 - self.mu);
        self.v = if self.sample_size > 1.0 {
            self.sse / (self.sample_size - 1.0)
        } else {
            self.sse
        };
        self.sigma = self.v.sqrt();
        self.sample_size += 1.0;
        if self.mu < 0.0 {
            log::warn!(
                "insert size mean went negative: mu={} sigma={} SSE={} sample_size={}",
                self.mu,
                self.sigma,
                self.sse,
                self.sample_size
            );
        }
        if self.sse < 0.0 {
            log::warn!(
                "insert size SSE went negative: mu={} sigma={} SSE={} sample_size={}",
                self.mu,
                self.sigma,
                self.sse,
                self.sample_size
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_sets_mean() {
        let mut est = InsertSizeDistribution::default();
        est.update(180);
        assert_eq!(est.mu, 180.0);
        assert_eq!(est.sample_size, 2.0);
    }

    #[test]
    fn test_large_observations_are_discarded() {
        let mut est = InsertSizeDistribution::default();
        est.update(2000);
        est.update(50_000);
        assert_eq!(est.sample_size, 1.0);
        assert_eq!(est.mu, 300.0);
    }

    #[test]
    fn test_converges_on_constant_input() {
        let mut est = InsertSizeDistribution::default();
        for _ in 0..200 {
            est.update(250);
        }
        assert!((est.mu - 250.0).abs() < 1e-3);
        assert!(est.sigma >= 0.0);
        assert_eq!(est.sample_size, 201.0);
    }

    #[test]
    fn test_sample_size_is_monotonic() {
        let mut est = InsertSizeDistribution::default();
        let mut prev = est.sample_size;
        for dist in [100, 1999, 300, 0, 750] {
            est.update(dist);
            assert!(est.sample_size > prev);
            assert!(est.mu >= 0.0);
            assert!(est.sigma >= 0.0);
            prev = est.sample_size;
        }
        est.update(2000);
        assert_eq!(est.sample_size, prev);
    }
}
