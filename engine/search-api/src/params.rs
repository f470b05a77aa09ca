//! Search parameters handed to the external searcher.

/// Parameters for one search invocation.
///
/// The book adjusts `cpuct_exploration` and `cpuct_exploration_log` before
/// every search to compensate for policy mass removed by avoid-move masks,
/// so searchers must honor whatever values arrive via `set_params`.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Visit budget for the whole search.
    pub max_visits: i64,

    /// Linear exploration coefficient in the PUCT formula.
    pub cpuct_exploration: f64,

    /// Logarithmic exploration coefficient in the PUCT formula.
    pub cpuct_exploration_log: f64,

    /// Extra root-level policy widening; 0.0 disables it.
    pub wide_root_noise: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_visits: 1000,
            cpuct_exploration: 1.0,
            cpuct_exploration_log: 0.45,
            wide_root_noise: 0.0,
        }
    }
}

impl SearchParams {
    pub fn with_max_visits(mut self, n: i64) -> Self {
        self.max_visits = n;
        self
    }

    pub fn with_wide_root_noise(mut self, w: f64) -> Self {
        self.wide_root_noise = w;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let params = SearchParams::default()
            .with_max_visits(50)
            .with_wide_root_noise(0.25);
        assert_eq!(params.max_visits, 50);
        assert!((params.wide_root_noise - 0.25).abs() < 1e-9);
    }
}
