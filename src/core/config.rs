use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("day count basis must be positive")]
    InvalidDayCountBasis,
    #[error("base metric names must be non-empty and distinct")]
    InvalidMetricNames,
}

/// Names under which a position's base metrics are exposed to formulas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseMetricNames {
    pub notional: String,
    pub agreed_rate: String,
    pub close_rate: String,
}

impl Default for BaseMetricNames {
    fn default() -> Self {
        Self {
            notional: "Monto USD".to_string(),
            agreed_rate: "Tipo de Cambio".to_string(),
            close_rate: "Tipo de Cambio Cierre".to_string(),
        }
    }
}

/// Engine-wide valuation settings.
///
/// Every field has a default, so a config file only needs the keys it
/// overrides:
///
/// ```
/// use hedge_mtm_engine::core::config::ValuationConfig;
///
/// let config = ValuationConfig::from_json_str(r#"{ "day_count_basis": 360 }"#).unwrap();
/// assert_eq!(config.day_count_basis, 360);
/// assert_eq!(config.base_metrics.notional, "Monto USD");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    /// Days per year used when annualizing implied rates.
    pub day_count_basis: u32,
    pub base_metrics: BaseMetricNames,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            day_count_basis: 365,
            base_metrics: BaseMetricNames::default(),
        }
    }
}

impl ValuationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.day_count_basis == 0 {
            return Err(ConfigError::InvalidDayCountBasis);
        }
        let names = &self.base_metrics;
        let all = [&names.notional, &names.agreed_rate, &names.close_rate];
        if all.iter().any(|n| n.trim().is_empty())
            || names.notional == names.agreed_rate
            || names.notional == names.close_rate
            || names.agreed_rate == names.close_rate
        {
            return Err(ConfigError::InvalidMetricNames);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValuationConfig::default();
        assert_eq!(config.day_count_basis, 365);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_basis_rejected() {
        let result = ValuationConfig::from_json_str(r#"{ "day_count_basis": 0 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidDayCountBasis)));
    }

    #[test]
    fn test_partial_metric_override() {
        let config =
            ValuationConfig::from_json_str(r#"{ "base_metrics": { "notional": "Nominal" } }"#)
                .unwrap();
        assert_eq!(config.base_metrics.notional, "Nominal");
        assert_eq!(config.base_metrics.agreed_rate, "Tipo de Cambio");
    }

    #[test]
    fn test_clashing_metric_names_rejected() {
        let result = ValuationConfig::from_json_str(
            r#"{ "base_metrics": { "notional": "X", "agreed_rate": "X" } }"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidMetricNames)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ValuationConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
