use async_trait::async_trait;
use crate::{AnalysisError, FinancialStatements, StatementFrequency};

/// Source of per-ticker financial statements.
#[async_trait]
pub trait FinancialsProvider: Send + Sync {
    /// Fetch cash-flow and income statements for `symbol`, most recent period first.
    async fn get_statements(
        &self,
        symbol: &str,
        frequency: StatementFrequency,
    ) -> Result<FinancialStatements, AnalysisError>;
}
