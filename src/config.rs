//! Analyzer configuration and capability negotiation.
//!
//! The only process-wide state is immutable: the fiscal year start month and
//! the set of capabilities this analyzer may use. Both are resolved once when
//! the analyzer is built.
//!
//! Environment (a `.env` file is honored via `dotenvy`):
//! - `FINSTAT_FISCAL_START_MONTH`: 1..=12, default 2 (February)
//! - `FINSTAT_DISABLE`: comma-separated capabilities to switch off
//!   (`correlation`, `seasonal`, `regression`, `volatility`)

use serde::Serialize;

use crate::error::AppError;

pub const ENV_FISCAL_START_MONTH: &str = "FINSTAT_FISCAL_START_MONTH";
pub const ENV_DISABLE: &str = "FINSTAT_DISABLE";

/// Default fiscal year start month (February).
pub const DEFAULT_FISCAL_START_MONTH: u32 = 2;

/// Statistical capabilities available to one analyzer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub correlation: bool,
    pub seasonal: bool,
    pub regression: bool,
    pub volatility: bool,
}

impl Capabilities {
    pub const NAMES: [&'static str; 4] = ["correlation", "seasonal", "regression", "volatility"];

    /// Everything this build provides.
    pub fn detect() -> Self {
        Self {
            correlation: true,
            seasonal: true,
            regression: true,
            volatility: true,
        }
    }

    pub fn none() -> Self {
        Self {
            correlation: false,
            seasonal: false,
            regression: false,
            volatility: false,
        }
    }

    /// Switch one capability off by name.
    pub fn without(mut self, name: &str) -> Result<Self, AppError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "correlation" => self.correlation = false,
            "seasonal" | "seasonality" => self.seasonal = false,
            "regression" => self.regression = false,
            "volatility" | "arch" | "garch" => self.volatility = false,
            other => {
                return Err(AppError::malformed(format!(
                    "Unknown capability '{other}' (expected one of: {})",
                    Self::NAMES.join(", ")
                )));
            }
        }
        Ok(self)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        match name {
            "correlation" => self.correlation,
            "seasonal" => self.seasonal,
            "regression" => self.regression,
            "volatility" => self.volatility,
            _ => false,
        }
    }

    pub fn missing(&self) -> Vec<&'static str> {
        Self::NAMES.into_iter().filter(|n| !self.is_enabled(n)).collect()
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalyzerConfig {
    pub fiscal_start_month: u32,
    pub capabilities: Capabilities,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fiscal_start_month: DEFAULT_FISCAL_START_MONTH,
            capabilities: Capabilities::detect(),
        }
    }
}

impl AnalyzerConfig {
    /// Load `.env`, then read the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through `lookup` (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_FISCAL_START_MONTH).filter(|s| !s.trim().is_empty()) {
            let month: u32 = raw.trim().parse().map_err(|_| {
                AppError::malformed(format!("{ENV_FISCAL_START_MONTH} must be a month number, got '{raw}'"))
            })?;
            if !(1..=12).contains(&month) {
                return Err(AppError::malformed(format!(
                    "{ENV_FISCAL_START_MONTH} must be 1..=12, got {month}"
                )));
            }
            config.fiscal_start_month = month;
        }

        if let Some(raw) = lookup(ENV_DISABLE) {
            for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                config.capabilities = config.capabilities.without(name)?;
            }
        }

        Ok(config)
    }

    pub fn with_fiscal_start_month(mut self, month: u32) -> Self {
        self.fiscal_start_month = month;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}
