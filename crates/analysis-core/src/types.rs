use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reporting window of the statements pulled from the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementFrequency {
    /// Fiscal-year statements; the newest column is the latest annual report
    #[default]
    Annual,
    /// Trailing twelve months
    Trailing,
}

impl StatementFrequency {
    /// Prefix Yahoo puts in front of every timeseries key
    pub fn series_prefix(&self) -> &'static str {
        match self {
            StatementFrequency::Annual => "annual",
            StatementFrequency::Trailing => "trailing",
        }
    }
}

impl std::fmt::Display for StatementFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.series_prefix())
    }
}

impl std::str::FromStr for StatementFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" => Ok(StatementFrequency::Annual),
            "trailing" | "ttm" => Ok(StatementFrequency::Trailing),
            other => Err(format!("unknown statement frequency '{}'", other)),
        }
    }
}

/// Which statement a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    CashFlow,
    Income,
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatementKind::CashFlow => write!(f, "cash flow"),
            StatementKind::Income => write!(f, "income statement"),
        }
    }
}

/// One column of the cash-flow statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowPeriod {
    pub as_of: NaiveDate,
    pub operating_cash_flow: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub capital_expenditure: Option<f64>,
    pub depreciation_and_amortization: Option<f64>,
    pub change_in_working_capital: Option<f64>,
}

impl CashFlowPeriod {
    pub fn empty(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            operating_cash_flow: None,
            free_cash_flow: None,
            capital_expenditure: None,
            depreciation_and_amortization: None,
            change_in_working_capital: None,
        }
    }
}

/// One column of the income statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomePeriod {
    pub as_of: NaiveDate,
    pub ebit: Option<f64>,
    pub tax_provision: Option<f64>,
}

impl IncomePeriod {
    pub fn empty(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            ebit: None,
            tax_provision: None,
        }
    }
}

/// Cash-flow and income statements for one ticker.
///
/// Both period lists are ordered most recent first, mirroring the column
/// order of the provider's tables. An empty list is an empty table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub symbol: String,
    pub frequency: StatementFrequency,
    pub cash_flow: Vec<CashFlowPeriod>,
    pub income: Vec<IncomePeriod>,
}

impl FinancialStatements {
    pub fn latest_cash_flow(&self) -> Option<&CashFlowPeriod> {
        self.cash_flow.first()
    }

    pub fn latest_income(&self) -> Option<&IncomePeriod> {
        self.income.first()
    }
}

/// After-tax free cash flow and the inputs it was derived from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtfcfResult {
    pub atfcf: f64,
    pub fcf: f64,
    pub ebit: f64,
    pub tax_rate: f64,
    pub tax_provision: f64,
    pub ocf: f64,
    pub capex: f64,
    pub da: f64,
    pub delta_wc: f64,
}
