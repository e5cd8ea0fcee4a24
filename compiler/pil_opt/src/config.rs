//! Combiner configuration.
//!
//! [`CombinerConfig`] is a plain value: construct it with [`new`], a preset
//! ([`debug`], [`release`]) or [`from_env`], then adjust individual knobs
//! with the `with_*` builder methods.
//!
//! [`new`]: CombinerConfig::new
//! [`debug`]: CombinerConfig::debug
//! [`release`]: CombinerConfig::release
//! [`from_env`]: CombinerConfig::from_env

/// Environment variable overriding [`CombinerConfig::max_iterations`].
pub const MAX_ITERATIONS_VAR: &str = "PIL_COMBINE_MAX_ITERATIONS";

/// Environment variable enabling [`CombinerConfig::verify_each_iteration`].
pub const VERIFY_VAR: &str = "PIL_COMBINE_VERIFY";

/// Knobs controlling a Combiner run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinerConfig {
    /// Upper bound on seed-and-drain rounds per function.
    /// Default: 8.
    pub max_iterations: u32,

    /// How many instructions the bounded forward and backward scans
    /// (retain/release pairing, load forwarding, dead stores) may inspect.
    /// Default: 32.
    pub max_scan_distance: usize,

    /// Turn `class_method` and `witness_method` into `function_ref` when
    /// the facts pin down the implementation.
    pub devirtualize: bool,

    /// Fold integer builtins whose operands are literals.
    pub fold_constants: bool,

    /// Rewrite multiplication by a power of two as a shift.
    pub strength_reduce: bool,

    /// Forward stored values to loads and delete dead stores and stack slots.
    pub forward_memory: bool,

    /// Run the verifier after every round and abort on failure.
    pub verify_each_iteration: bool,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CombinerConfig {
    /// Create a configuration with every rule family enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_iterations: 8,
            max_scan_distance: 32,
            devirtualize: true,
            fold_constants: true,
            strength_reduce: true,
            forward_memory: true,
            verify_each_iteration: false,
        }
    }

    /// Create a debug configuration (verifies after every round).
    #[must_use]
    pub fn debug() -> Self {
        Self::new().with_verify_each_iteration(true)
    }

    /// Create a release configuration.
    #[must_use]
    pub fn release() -> Self {
        Self::new()
    }

    /// Create the default configuration with `PIL_COMBINE_MAX_ITERATIONS`
    /// and `PIL_COMBINE_VERIFY` applied on top.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new().overlay(|key| std::env::var(key).ok())
    }

    /// Apply environment-style overrides read through `lookup`.
    ///
    /// Unparsable iteration counts are ignored with a warning. Any value of
    /// the verify switch other than `0`, `false` or the empty string turns
    /// verification on.
    #[must_use]
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(MAX_ITERATIONS_VAR) {
            match raw.trim().parse::<u32>() {
                Ok(n) => self.max_iterations = n,
                Err(_) => tracing::warn!(
                    var = MAX_ITERATIONS_VAR,
                    value = %raw,
                    "ignoring malformed iteration cap"
                ),
            }
        }
        if let Some(raw) = lookup(VERIFY_VAR) {
            let raw = raw.trim();
            self.verify_each_iteration =
                !(raw.is_empty() || raw == "0" || raw.eq_ignore_ascii_case("false"));
        }
        self
    }

    /// Set the iteration cap (builder pattern).
    #[must_use]
    pub fn with_max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n;
        self
    }

    /// Set the scan window (builder pattern).
    #[must_use]
    pub fn with_max_scan_distance(mut self, n: usize) -> Self {
        self.max_scan_distance = n;
        self
    }

    /// Enable or disable devirtualization (builder pattern).
    #[must_use]
    pub fn with_devirtualize(mut self, enable: bool) -> Self {
        self.devirtualize = enable;
        self
    }

    /// Enable or disable constant folding (builder pattern).
    #[must_use]
    pub fn with_fold_constants(mut self, enable: bool) -> Self {
        self.fold_constants = enable;
        self
    }

    /// Enable or disable strength reduction (builder pattern).
    #[must_use]
    pub fn with_strength_reduce(mut self, enable: bool) -> Self {
        self.strength_reduce = enable;
        self
    }

    /// Enable or disable the memory rules (builder pattern).
    #[must_use]
    pub fn with_forward_memory(mut self, enable: bool) -> Self {
        self.forward_memory = enable;
        self
    }

    /// Enable or disable per-round verification (builder pattern).
    #[must_use]
    pub fn with_verify_each_iteration(mut self, enable: bool) -> Self {
        self.verify_each_iteration = enable;
        self
    }
}
