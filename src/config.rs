//! Knobs for tuning how a [`Solver`](crate::Solver) behaves.

/// How evaluated values are remembered between calls.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CachePolicy {
    /// Remember every evaluated value. Any change to any binding clears the
    /// whole cache, so a dependent never sees a stale value.
    Memoize,
    /// Always re-walk the expression trees.
    Disabled,
}

/// What to do when a builtin function is given an argument outside its
/// domain (e.g. `sqrt(-1)`).
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DomainPolicy {
    /// Let the `NaN` or infinity flow through the rest of the calculation.
    Propagate,
    /// Fail with [`SolveError::Domain`](crate::SolveError::Domain).
    Reject,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Config {
    pub cache: CachePolicy,
    pub domain: DomainPolicy,
    /// The most points a single [`Solver::sample()`](crate::Solver::sample)
    /// call may produce.
    pub max_samples: usize,
    /// How long a chain of formulas may get (`a` uses `b` uses `c` ...)
    /// before evaluation gives up.
    pub max_depth: usize,
}

impl Config {
    pub const DEFAULT_MAX_SAMPLES: usize = 100_000;
    pub const DEFAULT_MAX_DEPTH: usize = 256;

    pub fn with_cache(self, cache: CachePolicy) -> Self {
        Config { cache, ..self }
    }

    pub fn with_domain(self, domain: DomainPolicy) -> Self {
        Config { domain, ..self }
    }

    pub fn with_max_samples(self, max_samples: usize) -> Self {
        Config {
            max_samples,
            ..self
        }
    }

    pub fn with_max_depth(self, max_depth: usize) -> Self {
        Config { max_depth, ..self }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache: CachePolicy::Memoize,
            domain: DomainPolicy::Propagate,
            max_samples: Config::DEFAULT_MAX_SAMPLES,
            max_depth: Config::DEFAULT_MAX_DEPTH,
        }
    }
}
