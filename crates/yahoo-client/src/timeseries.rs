//! Wire format of Yahoo's fundamentals-timeseries endpoint and its
//! conversion into typed statements.

use analysis_core::{
    AnalysisError, CashFlowPeriod, FinancialStatements, IncomePeriod, StatementFrequency,
    StatementKind,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Statement rows the calculator consumes, keyed by Yahoo's series suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementRow {
    OperatingCashFlow,
    FreeCashFlow,
    CapitalExpenditure,
    DepreciationAndAmortization,
    ChangeInWorkingCapital,
    Ebit,
    TaxProvision,
}

impl StatementRow {
    pub const ALL: [StatementRow; 7] = [
        StatementRow::OperatingCashFlow,
        StatementRow::FreeCashFlow,
        StatementRow::CapitalExpenditure,
        StatementRow::DepreciationAndAmortization,
        StatementRow::ChangeInWorkingCapital,
        StatementRow::Ebit,
        StatementRow::TaxProvision,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            StatementRow::OperatingCashFlow => "OperatingCashFlow",
            StatementRow::FreeCashFlow => "FreeCashFlow",
            StatementRow::CapitalExpenditure => "CapitalExpenditure",
            StatementRow::DepreciationAndAmortization => "DepreciationAndAmortization",
            StatementRow::ChangeInWorkingCapital => "ChangeInWorkingCapital",
            StatementRow::Ebit => "EBIT",
            StatementRow::TaxProvision => "TaxProvision",
        }
    }

    pub fn statement(&self) -> StatementKind {
        match self {
            StatementRow::Ebit | StatementRow::TaxProvision => StatementKind::Income,
            _ => StatementKind::CashFlow,
        }
    }

    /// Full series key, e.g. `annualFreeCashFlow`
    pub fn series_key(&self, frequency: StatementFrequency) -> String {
        format!("{}{}", frequency.series_prefix(), self.suffix())
    }

    fn from_series_key(key: &str, frequency: StatementFrequency) -> Option<Self> {
        let suffix = key.strip_prefix(frequency.series_prefix())?;
        Self::ALL.into_iter().find(|row| row.suffix() == suffix)
    }
}

/// Comma-joined `type` query parameter covering every row.
pub fn series_types(frequency: StatementFrequency) -> String {
    StatementRow::ALL
        .iter()
        .map(|row| row.series_key(frequency))
        .collect::<Vec<_>>()
        .join(",")
}

// Response structures
#[derive(Debug, Deserialize)]
pub(crate) struct TimeseriesResponse {
    pub(crate) timeseries: TimeseriesBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimeseriesBody {
    #[serde(default)]
    pub(crate) result: Vec<TimeseriesResult>,
    #[serde(default)]
    pub(crate) error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimeseriesResult {
    pub(crate) meta: TimeseriesMeta,
    /// The series itself sits under a key equal to `meta.type[0]`
    #[serde(flatten)]
    pub(crate) series: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimeseriesMeta {
    #[serde(rename = "type", default)]
    pub(crate) series_type: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DataPoint {
    #[serde(rename = "asOfDate")]
    as_of_date: String,
    #[serde(rename = "reportedValue")]
    reported_value: Option<ReportedValue>,
}

#[derive(Debug, Deserialize)]
struct ReportedValue {
    raw: Option<f64>,
}

impl TimeseriesBody {
    /// Surface a provider-side `error` object as an API error.
    pub(crate) fn into_results(self) -> Result<Vec<TimeseriesResult>, AnalysisError> {
        match self.error {
            Some(err) if !err.is_null() => Err(AnalysisError::ApiError(format!(
                "Yahoo timeseries error: {}",
                err
            ))),
            _ => Ok(self.result),
        }
    }
}

/// Group timeseries points into per-date statement columns, newest first.
pub(crate) fn build_statements(
    symbol: &str,
    frequency: StatementFrequency,
    results: Vec<TimeseriesResult>,
) -> FinancialStatements {
    let mut cash_flow: BTreeMap<NaiveDate, CashFlowPeriod> = BTreeMap::new();
    let mut income: BTreeMap<NaiveDate, IncomePeriod> = BTreeMap::new();

    for mut result in results {
        let Some(key) = result.meta.series_type.first().cloned() else {
            continue;
        };
        let Some(row) = StatementRow::from_series_key(&key, frequency) else {
            tracing::debug!("Ignoring unrequested series {} for {}", key, symbol);
            continue;
        };
        // A series with no reported values comes back with only `meta` and `timestamp`
        let Some(raw_points) = result.series.remove(&key) else {
            continue;
        };
        let points: Vec<Option<DataPoint>> = match serde_json::from_value(raw_points) {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!("Malformed {} series for {}: {}", key, symbol, e);
                continue;
            }
        };

        for point in points.into_iter().flatten() {
            let Some(value) = point.reported_value.and_then(|v| v.raw) else {
                continue;
            };
            let as_of = match NaiveDate::parse_from_str(&point.as_of_date, "%Y-%m-%d") {
                Ok(date) => date,
                Err(e) => {
                    tracing::warn!(
                        "Bad asOfDate '{}' in {} for {}: {}",
                        point.as_of_date, key, symbol, e
                    );
                    continue;
                }
            };

            match row.statement() {
                StatementKind::CashFlow => {
                    let period = cash_flow
                        .entry(as_of)
                        .or_insert_with(|| CashFlowPeriod::empty(as_of));
                    match row {
                        StatementRow::OperatingCashFlow => period.operating_cash_flow = Some(value),
                        StatementRow::FreeCashFlow => period.free_cash_flow = Some(value),
                        StatementRow::CapitalExpenditure => period.capital_expenditure = Some(value),
                        StatementRow::DepreciationAndAmortization => {
                            period.depreciation_and_amortization = Some(value)
                        }
                        StatementRow::ChangeInWorkingCapital => {
                            period.change_in_working_capital = Some(value)
                        }
                        StatementRow::Ebit | StatementRow::TaxProvision => {}
                    }
                }
                StatementKind::Income => {
                    let period = income
                        .entry(as_of)
                        .or_insert_with(|| IncomePeriod::empty(as_of));
                    match row {
                        StatementRow::Ebit => period.ebit = Some(value),
                        StatementRow::TaxProvision => period.tax_provision = Some(value),
                        _ => {}
                    }
                }
            }
        }
    }

    FinancialStatements {
        symbol: symbol.to_string(),
        frequency,
        cash_flow: cash_flow.into_values().rev().collect(),
        income: income.into_values().rev().collect(),
    }
}
