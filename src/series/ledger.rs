//! Splitting a general-ledger extract into a revenue series and one series
//! per expense account.
//!
//! Accounts are classified by account-number prefix: revenue accounts start
//! with `revenue_prefix` (default `"4"`), expense accounts with any of
//! `expense_prefixes` (default `5`-`8`).

use std::collections::BTreeMap;

use crate::domain::{Aggregation, Frequency, Record, TimeSeries};
use crate::series::builder::{prepare_time_series, value_to_key, SeriesSpec, TOTAL_SERIES};
use crate::series::FiscalCalendar;

/// Name given to the aggregated revenue series.
pub const REVENUE_SERIES: &str = "Revenue";

/// Field names and account classification for a ledger extract.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerLayout {
    pub amount_field: String,
    pub date_field: String,
    pub account_name_field: String,
    pub account_number_field: String,
    pub revenue_prefix: String,
    pub expense_prefixes: Vec<String>,
}

impl Default for LedgerLayout {
    fn default() -> Self {
        Self {
            amount_field: "amount".to_string(),
            date_field: "formuladate".to_string(),
            account_name_field: "account_name".to_string(),
            account_number_field: "account_number".to_string(),
            revenue_prefix: "4".to_string(),
            expense_prefixes: ["5", "6", "7", "8"].iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl LedgerLayout {
    fn account_number(&self, row: &Record) -> String {
        row.get(&self.account_number_field)
            .and_then(value_to_key)
            .unwrap_or_default()
    }

    fn is_revenue(&self, row: &Record) -> bool {
        !self.revenue_prefix.is_empty() && self.account_number(row).starts_with(&self.revenue_prefix)
    }

    fn is_expense(&self, row: &Record) -> bool {
        let number = self.account_number(row);
        self.expense_prefixes
            .iter()
            .any(|p| !p.is_empty() && number.starts_with(p.as_str()))
    }
}

/// Revenue and per-account expense series built from one ledger extract.
#[derive(Debug, Clone, Default)]
pub struct LedgerSeries {
    pub total_rows: usize,
    pub revenue_rows: usize,
    pub expense_rows: usize,
    pub revenue: Option<TimeSeries>,
    /// Expense series keyed by account name.
    pub expenses: BTreeMap<String, TimeSeries>,
    /// First account number seen for each expense account name.
    pub account_numbers: BTreeMap<String, String>,
}

impl LedgerSeries {
    /// Monthly sums for revenue (all revenue accounts combined) and for each
    /// expense account name.
    pub fn build(rows: &[Record], layout: &LedgerLayout, calendar: &FiscalCalendar) -> Self {
        let revenue_rows: Vec<Record> = rows.iter().filter(|r| layout.is_revenue(r)).cloned().collect();
        let expense_rows: Vec<Record> = rows.iter().filter(|r| layout.is_expense(r)).cloned().collect();

        let base = SeriesSpec::new(layout.amount_field.clone(), layout.date_field.clone())
            .aggregation(Aggregation::Sum)
            .frequency(Frequency::Monthly);

        let revenue = prepare_time_series(&revenue_rows, &base, calendar)
            .remove(TOTAL_SERIES)
            .map(|s| s.renamed(REVENUE_SERIES));

        let mut expenses = if expense_rows.is_empty() {
            BTreeMap::new()
        } else {
            let by_account = base.group_by(layout.account_name_field.clone());
            prepare_time_series(&expense_rows, &by_account, calendar)
        };
        // Rows without an account name collapse into "total"; that is not an account.
        if !expense_rows
            .iter()
            .any(|r| r.contains_key(layout.account_name_field.as_str()))
        {
            expenses.clear();
        }

        let mut account_numbers = BTreeMap::new();
        for row in &expense_rows {
            if let Some(name) = row.get(&layout.account_name_field).and_then(value_to_key) {
                account_numbers
                    .entry(name)
                    .or_insert_with(|| layout.account_number(row));
            }
        }

        Self {
            total_rows: rows.len(),
            revenue_rows: revenue_rows.len(),
            expense_rows: expense_rows.len(),
            revenue,
            expenses,
            account_numbers,
        }
    }

    pub fn account_number(&self, account_name: &str) -> &str {
        self.account_numbers
            .get(account_name)
            .map(String::as_str)
            .unwrap_or("")
    }
}
