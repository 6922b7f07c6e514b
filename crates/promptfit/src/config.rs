//! Tunable parameters for the [`ContextWindowManager`](crate::context::ContextWindowManager).
//!
//! All fields have defaults, so a config file only needs the values it
//! changes:
//!
//! ```toml
//! reserve_tokens = 256
//! reduction_ratio = 0.6
//!
//! [policy]
//! forced = ["code-changes", "reminder"]
//! ```
//!
//! Builder methods cover the same fields for programmatic use:
//!
//! ```
//! use promptfit::BudgetConfig;
//!
//! let config = BudgetConfig::default()
//!     .with_reserve(256)
//!     .with_truncation_floor(64)
//!     .with_reduction_ratio(0.5);
//! assert!(config.validate().is_ok());
//! ```

use crate::context::BlockPolicy;
use crate::error::BudgetError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tokens held back for the response and protocol overhead.
pub const DEFAULT_RESERVE_TOKENS: usize = 100;

/// Below this many remaining tokens an ordinary block is dropped rather than
/// truncated, and the reducer removes blocks instead of shrinking them.
pub const DEFAULT_TRUNCATION_FLOOR: usize = 100;

/// Fraction of its current size a block keeps per reduction step.
pub const DEFAULT_REDUCTION_RATIO: f64 = 0.7;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BudgetConfig {
    pub reserve_tokens: usize,
    pub truncation_floor: usize,
    pub reduction_ratio: f64,
    pub policy: BlockPolicy,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            reserve_tokens: DEFAULT_RESERVE_TOKENS,
            truncation_floor: DEFAULT_TRUNCATION_FLOOR,
            reduction_ratio: DEFAULT_REDUCTION_RATIO,
            policy: BlockPolicy::default(),
        }
    }
}

impl BudgetConfig {
    pub fn with_reserve(mut self, tokens: usize) -> Self {
        self.reserve_tokens = tokens;
        self
    }

    pub fn with_truncation_floor(mut self, tokens: usize) -> Self {
        self.truncation_floor = tokens;
        self
    }

    pub fn with_reduction_ratio(mut self, ratio: f64) -> Self {
        self.reduction_ratio = ratio;
        self
    }

    pub fn with_policy(mut self, policy: BlockPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Parse a TOML document and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, BudgetError> {
        let config: Self =
            toml::from_str(text).map_err(|e| BudgetError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BudgetError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BudgetError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges and policy consistency.
    pub fn validate(&self) -> Result<(), BudgetError> {
        if !(self.reduction_ratio > 0.0 && self.reduction_ratio < 1.0) {
            return Err(BudgetError::InvalidConfig(format!(
                "reduction_ratio must be between 0 and 1 (exclusive), got {}",
                self.reduction_ratio
            )));
        }
        if let Some(name) = self.policy.forced.iter().find(|n| !self.policy.is_known(n)) {
            return Err(BudgetError::InvalidConfig(format!(
                "forced block {name} is missing from canonical_order"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self
            .policy
            .canonical_order
            .iter()
            .find(|n| !seen.insert(n.as_str()))
        {
            return Err(BudgetError::InvalidConfig(format!(
                "{dup} appears twice in canonical_order"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let config = BudgetConfig::default();
        assert_eq!(config.reserve_tokens, 100);
        assert_eq!(config.truncation_floor, 100);
        assert!((config.reduction_ratio - 0.7).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let config = BudgetConfig::from_toml_str("reserve_tokens = 256\nreduction_ratio = 0.5").unwrap();
        assert_eq!(config.reserve_tokens, 256);
        assert_eq!(config.truncation_floor, DEFAULT_TRUNCATION_FLOOR);
        assert!((config.reduction_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.policy, BlockPolicy::default());
    }

    #[test]
    fn ratio_out_of_range_is_rejected() {
        for ratio in [0.0, 1.0, 1.5, -0.2, f64::NAN] {
            let err = BudgetConfig::default()
                .with_reduction_ratio(ratio)
                .validate()
                .unwrap_err();
            assert!(matches!(err, BudgetError::InvalidConfig(_)), "{ratio}");
        }
    }

    #[test]
    fn forced_name_must_be_ordered() {
        let config = BudgetConfig::default().with_policy(BlockPolicy::new(["x"], ["y"]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_order_entry_rejected() {
        let config = BudgetConfig::default().with_policy(BlockPolicy::new(["y"], ["y", "y"]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_invalid_config() {
        let err = BudgetConfig::from_toml_str("reserve_tokens = \"lots\"").unwrap_err();
        assert!(matches!(err, BudgetError::InvalidConfig(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "truncation_floor = 32\n[policy]\nforced = [\"a\"]\ncanonical_order = [\"b\", \"a\"]"
        )
        .unwrap();
        let config = BudgetConfig::from_file(file.path()).unwrap();
        assert_eq!(config.truncation_floor, 32);
        assert!(config.policy.is_forced("a"));
        assert_eq!(config.policy.order_of("a"), Some(1));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = BudgetConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
