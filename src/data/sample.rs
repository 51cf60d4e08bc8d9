//! Synthetic general-ledger extract for demos and tests.
//!
//! Two revenue accounts (one seasonal with a growth trend) and six expense
//! accounts with known relationships to revenue:
//! - commissions follow total revenue one month later
//! - marketing and cost of goods move with same-month revenue
//! - write-downs move against revenue
//! - supplies and bank fees are pure noise
//!
//! Revenue noise has GARCH-style clustering so long samples exercise the
//! volatility stage.

use std::f64::consts::PI;

use chrono::{Datelike, Months, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde_json::Value;

use crate::domain::Record;
use crate::error::AppError;

/// Transactions posted per account per month, with their share of the total.
const POSTINGS: [(u32, f64); 3] = [(5, 0.5), (15, 0.3), (25, 0.2)];

/// Column order used when the ledger is written as CSV.
pub const LEDGER_COLUMNS: [&str; 4] = ["formuladate", "account_number", "account_name", "amount"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleConfig {
    pub months: usize,
    pub seed: u64,
    /// First month of the ledger; only year and month are used.
    pub start: NaiveDate,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            months: 48,
            seed: 42,
            start: NaiveDate::from_ymd_opt(2021, 2, 1).unwrap_or_default(),
        }
    }
}

struct Monthly {
    product: f64,
    service: f64,
}

impl Monthly {
    fn total(&self) -> f64 {
        self.product + self.service
    }
}

fn normal(sd: f64) -> Result<Normal<f64>, AppError> {
    Normal::new(0.0, sd).map_err(|e| AppError::computation(format!("Noise distribution error: {e}")))
}

/// Revenue per month: trend + annual cycle + clustered noise.
fn revenue_path(rng: &mut StdRng, months: usize) -> Result<Vec<Monthly>, AppError> {
    let z = normal(1.0)?;
    let service_noise = normal(1_500.0)?;

    // sigma²_t = omega + 0.3 e²_{t-1} + 0.6 sigma²_{t-1}, long-run sd 3000.
    let long_run = 3_000.0_f64.powi(2);
    let omega = 0.1 * long_run;
    let mut sigma2 = long_run;
    let mut prev_shock = 0.0_f64;

    let mut out = Vec::with_capacity(months);
    for t in 0..months {
        sigma2 = omega + 0.3 * prev_shock.powi(2) + 0.6 * sigma2;
        let shock = sigma2.sqrt() * z.sample(rng);
        prev_shock = shock;

        let tf = t as f64;
        let season = 25_000.0 * (2.0 * PI * tf / 12.0).sin();
        out.push(Monthly {
            product: 120_000.0 + 900.0 * tf + season + shock,
            service: 40_000.0 + 300.0 * tf + service_noise.sample(rng),
        });
    }
    Ok(out)
}

fn posting(date: NaiveDate, number: &str, name: &str, amount: f64) -> Record {
    let mut row = Record::new();
    row.insert("formuladate".to_string(), Value::String(date.format("%Y-%m-%d").to_string()));
    row.insert("account_number".to_string(), Value::String(number.to_string()));
    row.insert("account_name".to_string(), Value::String(name.to_string()));
    row.insert("amount".to_string(), Value::from((amount * 100.0).round() / 100.0));
    row
}

/// Generate `config.months` months of ledger postings.
pub fn generate_ledger(config: &SampleConfig) -> Result<Vec<Record>, AppError> {
    if config.months == 0 {
        return Err(AppError::malformed("Sample month count must be > 0."));
    }
    let first = NaiveDate::from_ymd_opt(config.start.year(), config.start.month(), 1)
        .ok_or_else(|| AppError::malformed(format!("Invalid sample start date {}", config.start)))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let revenue = revenue_path(&mut rng, config.months)?;

    let commissions_noise = normal(400.0)?;
    let marketing_noise = normal(900.0)?;
    let supplies_noise = normal(300.0)?;
    let fees_noise = normal(120.0)?;
    let writedown_noise = normal(1_000.0)?;
    let cogs_noise = normal(2_500.0)?;

    let mut rows = Vec::with_capacity(config.months * 8 * POSTINGS.len());
    for (t, month) in revenue.iter().enumerate() {
        let offset = u32::try_from(t).map_err(|_| AppError::malformed("Sample month count is too large."))?;
        let month_start = first
            .checked_add_months(Months::new(offset))
            .ok_or_else(|| AppError::malformed("Sample range runs past the supported calendar."))?;

        let total = month.total();
        let previous_total = t.checked_sub(1).map_or(total, |p| revenue[p].total());

        let accounts: [(&str, &str, f64); 8] = [
            ("41000", "Product Revenue", month.product),
            ("42000", "Service Revenue", month.service),
            ("531110", "Sales Commissions", 0.08 * previous_total + commissions_noise.sample(&mut rng)),
            ("533060", "Marketing Programs", 0.05 * total + marketing_noise.sample(&mut rng)),
            ("591110", "Office Supplies", 2_500.0 + supplies_noise.sample(&mut rng)),
            ("593060", "Bank Fees", 900.0 + fees_noise.sample(&mut rng)),
            ("597010", "Inventory Write-downs", 60_000.0 - 0.15 * total + writedown_noise.sample(&mut rng)),
            ("612000", "Cost of Goods Sold", 0.42 * total + cogs_noise.sample(&mut rng)),
        ];

        for (number, name, amount) in accounts {
            for (day, share) in POSTINGS {
                let date = month_start.with_day(day).unwrap_or(month_start);
                rows.push(posting(date, number, name, amount * share));
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{FiscalCalendar, LedgerLayout, LedgerSeries};

    #[test]
    fn ledger_has_expected_shape() {
        let config = SampleConfig {
            months: 24,
            ..SampleConfig::default()
        };
        let rows = generate_ledger(&config).unwrap();
        assert_eq!(rows.len(), 24 * 8 * 3);
        assert_eq!(rows[0]["formuladate"], "2021-02-05");
        assert_eq!(rows[0]["account_number"], "41000");

        let ledger = LedgerSeries::build(&rows, &LedgerLayout::default(), &FiscalCalendar::default());
        let revenue = ledger.revenue.as_ref().unwrap();
        assert_eq!(revenue.len(), 24);
        assert_eq!(ledger.expenses.len(), 6);
        assert!(ledger.expenses.values().all(|s| s.len() == 24));
        assert_eq!(ledger.account_number("Cost of Goods Sold"), "612000");
    }

    #[test]
    fn same_seed_same_ledger() {
        let a = generate_ledger(&SampleConfig::default()).unwrap();
        let b = generate_ledger(&SampleConfig::default()).unwrap();
        assert_eq!(a, b);
        let c = generate_ledger(&SampleConfig { seed: 7, ..SampleConfig::default() }).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_empty_range() {
        let err = generate_ledger(&SampleConfig { months: 0, ..SampleConfig::default() }).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedInput);
    }
}
