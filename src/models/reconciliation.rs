use rust_decimal::Decimal;
use serde::Serialize;

/// Per-hash classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    AmountDifferent,
    OnlyInLedger,
    OnlyInChain,
    Matched,
}

impl Outcome {
    /// Report ordering: discrepancies first, clean matches last.
    pub fn priority(&self) -> u8 {
        match self {
            Outcome::AmountDifferent => 1,
            Outcome::OnlyInLedger => 2,
            Outcome::OnlyInChain => 3,
            Outcome::Matched => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::AmountDifferent => "AMOUNT_DIFFERENT",
            Outcome::OnlyInLedger => "ONLY_IN_LEDGER",
            Outcome::OnlyInChain => "ONLY_IN_CHAIN",
            Outcome::Matched => "MATCHED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Ok,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

/// One amount from a source dataset, with the row it came from when the
/// source is tabular.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRecord {
    pub amount: Decimal,
    pub row: Option<usize>,
}

impl SourceRecord {
    pub fn new(amount: Decimal) -> Self {
        Self { amount, row: None }
    }

    pub fn with_row(amount: Decimal, row: usize) -> Self {
        Self {
            amount,
            row: Some(row),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationRecord {
    pub hash: String,
    pub present_in_ledger: bool,
    pub present_in_chain: bool,
    /// 0 when the hash is absent from that source.
    pub ledger_amount: Decimal,
    pub chain_amount: Decimal,
    pub difference: Decimal,
    pub outcome: Outcome,
    pub severity: Severity,
    pub notes: String,
    pub ledger_row: Option<usize>,
    pub chain_row: Option<usize>,
}

/// Aggregate statistics over one reconciliation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationSummary {
    pub total: usize,
    pub matched: usize,
    pub amount_different: usize,
    pub only_in_ledger: usize,
    pub only_in_chain: usize,
    /// Sum of differences, matched records excluded.
    pub total_difference: Decimal,
    /// matched / total distinct hashes, in percent.
    pub match_rate: f64,
}
