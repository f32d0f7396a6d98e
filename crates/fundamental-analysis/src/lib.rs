use analysis_core::{AnalysisError, AtfcfResult, FinancialStatements, StatementKind};

/// After-tax free cash flow: `FCF - EBIT * (tax provision / EBIT)`.
///
/// Only the most recent period of each statement is read. A single missing
/// or unusable value aborts the whole calculation.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtfcfCalculator;

impl AtfcfCalculator {
    pub fn new() -> Self {
        Self
    }

    fn calculate_tax_rate(&self, tax_provision: f64, ebit: f64) -> Option<f64> {
        if ebit > 0.0 {
            Some(tax_provision / ebit)
        } else {
            None
        }
    }

    pub fn calculate(&self, statements: &FinancialStatements) -> Result<AtfcfResult, AnalysisError> {
        let symbol = &statements.symbol;

        let (Some(cash_flow), Some(income)) = (statements.latest_cash_flow(), statements.latest_income()) else {
            tracing::info!("No data available for {}", symbol);
            return Err(AnalysisError::InsufficientData(format!(
                "empty {} statements for {}",
                statements.frequency, symbol
            )));
        };

        let ocf = require(cash_flow.operating_cash_flow, StatementKind::CashFlow, "Operating Cash Flow")?;
        let fcf = require(cash_flow.free_cash_flow, StatementKind::CashFlow, "Free Cash Flow")?;
        let capex = require(cash_flow.capital_expenditure, StatementKind::CashFlow, "Capital Expenditure")?;
        let da = require(
            cash_flow.depreciation_and_amortization,
            StatementKind::CashFlow,
            "Depreciation And Amortization",
        )?;
        let delta_wc = require(
            cash_flow.change_in_working_capital,
            StatementKind::CashFlow,
            "Change In Working Capital",
        )?;
        let ebit = require(income.ebit, StatementKind::Income, "EBIT")?;
        let tax_provision = require(income.tax_provision, StatementKind::Income, "Tax Provision")?;

        let tax_rate = self
            .calculate_tax_rate(tax_provision, ebit)
            .ok_or(AnalysisError::NonPositiveEbit(ebit))?;
        let atfcf = fcf - ebit * tax_rate;

        tracing::info!(
            "{} metrics ({} as of {}): FCF ${:.0}, EBIT ${:.0}, tax provision ${:.0}, tax rate {:.2}%, ATFCF ${:.0}",
            symbol,
            statements.frequency,
            cash_flow.as_of,
            fcf,
            ebit,
            tax_provision,
            tax_rate * 100.0,
            atfcf
        );

        Ok(AtfcfResult {
            atfcf,
            fcf,
            ebit,
            tax_rate,
            tax_provision,
            ocf,
            capex,
            da,
            delta_wc,
        })
    }
}

fn require(value: Option<f64>, statement: StatementKind, field: &'static str) -> Result<f64, AnalysisError> {
    match value {
        None => Err(AnalysisError::MissingField { statement, field }),
        Some(v) if !v.is_finite() => Err(AnalysisError::InvalidData(format!("{} is {}", field, v))),
        Some(v) => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{CashFlowPeriod, IncomePeriod, StatementFrequency};
    use chrono::NaiveDate;

    fn date(year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, 12, 31).unwrap()
    }

    fn statements(fcf: f64, ebit: f64, tax_provision: f64) -> FinancialStatements {
        FinancialStatements {
            symbol: "TEST".to_string(),
            frequency: StatementFrequency::Annual,
            cash_flow: vec![CashFlowPeriod {
                as_of: date(2024),
                operating_cash_flow: Some(180_000_000_000.0),
                free_cash_flow: Some(fcf),
                capital_expenditure: Some(-25_611_000_000.0),
                depreciation_and_amortization: Some(11_500_000_000.0),
                change_in_working_capital: Some(-3_000_000_000.0),
            }],
            income: vec![IncomePeriod {
                as_of: date(2024),
                ebit: Some(ebit),
                tax_provision: Some(tax_provision),
            }],
        }
    }

    #[test]
    fn test_twenty_percent_tax_rate() {
        let calc = AtfcfCalculator::new();
        let result = calc
            .calculate(&statements(154_389_000_000.0, 200_000_000_000.0, 40_000_000_000.0))
            .unwrap();

        assert!((result.tax_rate - 0.20).abs() < 1e-12);
        assert!((result.atfcf - 114_389_000_000.0).abs() < 1e-3);
        assert_eq!(result.fcf, 154_389_000_000.0);
        assert_eq!(result.ebit, 200_000_000_000.0);
        assert_eq!(result.tax_provision, 40_000_000_000.0);
        assert_eq!(result.ocf, 180_000_000_000.0);
        assert_eq!(result.capex, -25_611_000_000.0);
        assert_eq!(result.da, 11_500_000_000.0);
        assert_eq!(result.delta_wc, -3_000_000_000.0);
    }

    #[test]
    fn test_formula_holds_exactly() {
        let calc = AtfcfCalculator::new();
        let cases = [
            (1_000.0, 333.0, 71.0),
            (-5_000_000.0, 12_345_678.0, 2_000_001.0),
            (42.5, 0.75, -0.1),
            (9.99e11, 1.23e11, 3.3e10),
        ];
        for (fcf, ebit, tax) in cases {
            let r = calc.calculate(&statements(fcf, ebit, tax)).unwrap();
            assert_eq!(r.atfcf, fcf - ebit * (tax / ebit));
            assert_eq!(r.tax_rate, tax / ebit);
        }
    }

    #[test]
    fn test_non_positive_ebit() {
        let calc = AtfcfCalculator::new();
        for ebit in [0.0, -1.0, -200_000_000_000.0] {
            let err = calc.calculate(&statements(100.0, ebit, 10.0)).unwrap_err();
            assert!(matches!(err, AnalysisError::NonPositiveEbit(v) if v == ebit));
        }
    }

    #[test]
    fn test_empty_cash_flow_table() {
        let mut s = statements(1.0, 2.0, 0.5);
        s.cash_flow.clear();
        let err = AtfcfCalculator::new().calculate(&s).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
    }

    #[test]
    fn test_empty_income_table() {
        let mut s = statements(1.0, 2.0, 0.5);
        s.income.clear();
        let err = AtfcfCalculator::new().calculate(&s).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
    }

    #[test]
    fn test_each_missing_field_aborts() {
        let calc = AtfcfCalculator::new();
        let clear: [(&str, fn(&mut FinancialStatements)); 7] = [
            ("Operating Cash Flow", |s| s.cash_flow[0].operating_cash_flow = None),
            ("Free Cash Flow", |s| s.cash_flow[0].free_cash_flow = None),
            ("Capital Expenditure", |s| s.cash_flow[0].capital_expenditure = None),
            ("Depreciation And Amortization", |s| s.cash_flow[0].depreciation_and_amortization = None),
            ("Change In Working Capital", |s| s.cash_flow[0].change_in_working_capital = None),
            ("EBIT", |s| s.income[0].ebit = None),
            ("Tax Provision", |s| s.income[0].tax_provision = None),
        ];

        for (expected, clear_field) in clear {
            let mut s = statements(1.0, 2.0, 0.5);
            clear_field(&mut s);
            match calc.calculate(&s) {
                Err(AnalysisError::MissingField { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected missing {}, got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_missing_field_beats_bad_ebit() {
        let mut s = statements(1.0, -5.0, 0.5);
        s.income[0].tax_provision = None;
        let err = AtfcfCalculator::new().calculate(&s).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingField { statement: StatementKind::Income, .. }));
    }

    #[test]
    fn test_only_latest_period_is_read() {
        let mut s = statements(1.0, 2.0, 0.5);
        let mut older = s.cash_flow[0].clone();
        older.as_of = date(2023);
        s.cash_flow[0].free_cash_flow = None;
        older.free_cash_flow = Some(10.0);
        s.cash_flow.push(older);

        let err = AtfcfCalculator::new().calculate(&s).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingField { field: "Free Cash Flow", .. }));
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let err = AtfcfCalculator::new()
            .calculate(&statements(f64::NAN, 2.0, 0.5))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidData(_)));

        let err = AtfcfCalculator::new()
            .calculate(&statements(1.0, f64::INFINITY, 0.5))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidData(_)));
    }
}
