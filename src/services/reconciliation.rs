//! Hash-keyed, tolerance-based matching between the manual ledger and the
//! normalized chain records.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::reconciliation::{
    Outcome, ReconciliationRecord, ReconciliationSummary, Severity, SourceRecord,
};
use crate::models::transfer::CanonicalTransfer;

/// One cent-equivalent.
pub const DEFAULT_TOLERANCE: Decimal = dec!(0.01);

pub struct ReconciliationEngine {
    tolerance: Decimal,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl ReconciliationEngine {
    pub fn new(tolerance: Decimal) -> Self {
        Self { tolerance }
    }

    /// Classify every hash present in either source.
    ///
    /// The output covers the union of hashes exactly once each, grouped by
    /// outcome (amount mismatches first, clean matches last) and sorted by
    /// descending difference within a group, with the hash as a final
    /// tiebreak so repeated runs produce identical reports.
    pub fn reconcile(
        &self,
        ledger: &HashMap<String, SourceRecord>,
        chain: &HashMap<String, SourceRecord>,
    ) -> Vec<ReconciliationRecord> {
        let all_hashes: BTreeSet<&String> = ledger.keys().chain(chain.keys()).collect();

        let mut records: Vec<ReconciliationRecord> = all_hashes
            .into_iter()
            .map(|hash| self.classify(hash, ledger.get(hash), chain.get(hash)))
            .collect();

        records.sort_by(|a, b| {
            a.outcome
                .priority()
                .cmp(&b.outcome.priority())
                .then_with(|| b.difference.cmp(&a.difference))
                .then_with(|| a.hash.cmp(&b.hash))
        });

        records
    }

    fn classify(
        &self,
        hash: &str,
        ledger: Option<&SourceRecord>,
        chain: Option<&SourceRecord>,
    ) -> ReconciliationRecord {
        let (outcome, difference, severity, notes) = match (ledger, chain) {
            (Some(l), Some(c)) => {
                let difference = (l.amount - c.amount).abs();
                if difference <= self.tolerance {
                    (
                        Outcome::Matched,
                        difference,
                        Severity::Ok,
                        "Perfect match".to_string(),
                    )
                } else {
                    (
                        Outcome::AmountDifferent,
                        difference,
                        mismatch_severity(difference),
                        format!("Amount differs by ${:.2}", difference),
                    )
                }
            }
            (Some(l), None) => (
                Outcome::OnlyInLedger,
                l.amount.abs(),
                missing_severity(l.amount.abs()),
                "Recorded in ledger but not found on chain".to_string(),
            ),
            (None, Some(c)) => (
                Outcome::OnlyInChain,
                c.amount.abs(),
                missing_severity(c.amount.abs()),
                "On-chain transfer not recorded in ledger".to_string(),
            ),
            (None, None) => unreachable!("hash taken from the union of both sources"),
        };

        ReconciliationRecord {
            hash: hash.to_string(),
            present_in_ledger: ledger.is_some(),
            present_in_chain: chain.is_some(),
            ledger_amount: ledger.map(|r| r.amount).unwrap_or(Decimal::ZERO),
            chain_amount: chain.map(|r| r.amount).unwrap_or(Decimal::ZERO),
            difference,
            outcome,
            severity,
            notes,
            ledger_row: ledger.and_then(|r| r.row),
            chain_row: chain.and_then(|r| r.row),
        }
    }

    pub fn summarize(&self, records: &[ReconciliationRecord]) -> ReconciliationSummary {
        let mut summary = ReconciliationSummary {
            total: records.len(),
            ..Default::default()
        };

        for record in records {
            match record.outcome {
                Outcome::Matched => summary.matched += 1,
                Outcome::AmountDifferent => summary.amount_different += 1,
                Outcome::OnlyInLedger => summary.only_in_ledger += 1,
                Outcome::OnlyInChain => summary.only_in_chain += 1,
            }
            if record.outcome != Outcome::Matched {
                summary.total_difference += record.difference;
            }
        }

        if summary.total > 0 {
            summary.match_rate = summary.matched as f64 / summary.total as f64 * 100.0;
        }

        summary
    }
}

fn mismatch_severity(difference: Decimal) -> Severity {
    if difference < dec!(1) {
        Severity::Low
    } else if difference < dec!(100) {
        Severity::Medium
    } else {
        Severity::High
    }
}

fn missing_severity(amount: Decimal) -> Severity {
    if amount < dec!(100) {
        Severity::Medium
    } else {
        Severity::High
    }
}

/// Build the chain-side amount map from normalized transfers, keyed by
/// hash. Signed amounts are used when a reference wallet resolved the
/// direction. Duplicate hashes keep the later record (and are logged);
/// each source contributes one amount per hash.
pub fn chain_amount_map(transfers: &[CanonicalTransfer]) -> HashMap<String, SourceRecord> {
    let mut map = HashMap::new();

    for (index, transfer) in transfers.iter().enumerate() {
        let amount = transfer.signed_amount.unwrap_or(transfer.formatted_amount);
        let record = SourceRecord::with_row(amount, index + 1);

        if map.insert(transfer.hash.clone(), record).is_some() {
            tracing::warn!(
                "Duplicate chain hash {}, keeping the later transfer",
                transfer.hash
            );
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(entries: &[(&str, Decimal)]) -> HashMap<String, SourceRecord> {
        entries
            .iter()
            .map(|(hash, amount)| (hash.to_string(), SourceRecord::new(*amount)))
            .collect()
    }

    #[test]
    fn test_matched_within_tolerance() {
        let engine = ReconciliationEngine::default();
        let records = engine.reconcile(
            &source(&[("h1", dec!(100.00))]),
            &source(&[("h1", dec!(100.00))]),
        );

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, Outcome::Matched);
        assert_eq!(records[0].severity, Severity::Ok);
    }

    #[test]
    fn test_amount_different_medium() {
        let engine = ReconciliationEngine::default();
        let records = engine.reconcile(
            &source(&[("h1", dec!(100.00))]),
            &source(&[("h1", dec!(150.00))]),
        );

        assert_eq!(records[0].outcome, Outcome::AmountDifferent);
        assert_eq!(records[0].difference, dec!(50.00));
        assert_eq!(records[0].severity, Severity::Medium);
    }

    #[test]
    fn test_only_in_ledger_medium() {
        let engine = ReconciliationEngine::default();
        let records = engine.reconcile(&source(&[("h2", dec!(5.00))]), &source(&[]));

        assert_eq!(records[0].outcome, Outcome::OnlyInLedger);
        assert_eq!(records[0].severity, Severity::Medium);
        assert_eq!(records[0].chain_amount, Decimal::ZERO);
    }

    #[test]
    fn test_only_in_chain_high() {
        let engine = ReconciliationEngine::default();
        let records = engine.reconcile(&source(&[]), &source(&[("h3", dec!(500.00))]));

        assert_eq!(records[0].outcome, Outcome::OnlyInChain);
        assert_eq!(records[0].severity, Severity::High);
        assert_eq!(records[0].difference, dec!(500.00));
    }

    #[test]
    fn test_severity_boundaries() {
        let engine = ReconciliationEngine::default();
        let chain = source(&[
            ("a", dec!(0)),
            ("b", dec!(0)),
            ("c", dec!(0)),
            ("d", dec!(0)),
        ]);
        let ledger = source(&[
            ("a", dec!(0.999)),
            ("b", dec!(1)),
            ("c", dec!(99.999)),
            ("d", dec!(100)),
        ]);

        let by_hash: HashMap<String, Severity> = engine
            .reconcile(&ledger, &chain)
            .into_iter()
            .map(|r| (r.hash.clone(), r.severity))
            .collect();

        assert_eq!(by_hash["a"], Severity::Low);
        assert_eq!(by_hash["b"], Severity::Medium);
        assert_eq!(by_hash["c"], Severity::Medium);
        assert_eq!(by_hash["d"], Severity::High);
    }

    #[test]
    fn test_tolerance_is_inclusive_and_overridable() {
        let engine = ReconciliationEngine::default();
        let records = engine.reconcile(
            &source(&[("h1", dec!(100.00))]),
            &source(&[("h1", dec!(100.01))]),
        );
        assert_eq!(records[0].outcome, Outcome::Matched);

        let strict = ReconciliationEngine::new(Decimal::ZERO);
        let records = strict.reconcile(
            &source(&[("h1", dec!(100.00))]),
            &source(&[("h1", dec!(100.01))]),
        );
        assert_eq!(records[0].outcome, Outcome::AmountDifferent);
    }

    #[test]
    fn test_totality_and_uniqueness() {
        let engine = ReconciliationEngine::default();
        let ledger = source(&[("h1", dec!(1)), ("h2", dec!(2)), ("h3", dec!(3))]);
        let chain = source(&[("h2", dec!(2)), ("h3", dec!(30)), ("h4", dec!(4))]);

        let records = engine.reconcile(&ledger, &chain);

        assert_eq!(records.len(), 4);
        let mut hashes: Vec<&str> = records.iter().map(|r| r.hash.as_str()).collect();
        hashes.sort();
        hashes.dedup();
        assert_eq!(hashes, vec!["h1", "h2", "h3", "h4"]);
    }

    #[test]
    fn test_ordering_and_idempotence() {
        let engine = ReconciliationEngine::default();
        let ledger = source(&[
            ("m1", dec!(10)),
            ("d_small", dec!(100)),
            ("d_big", dec!(100)),
            ("l1", dec!(7)),
        ]);
        let chain = source(&[
            ("m1", dec!(10)),
            ("d_small", dec!(102)),
            ("d_big", dec!(900)),
            ("c1", dec!(3)),
        ]);

        let first = engine.reconcile(&ledger, &chain);
        let second = engine.reconcile(&ledger, &chain);

        let order: Vec<&str> = first.iter().map(|r| r.hash.as_str()).collect();
        // Mismatches by descending difference, then one-sided records,
        // then matches.
        assert_eq!(order, vec!["d_big", "d_small", "l1", "c1", "m1"]);

        let repeat: Vec<&str> = second.iter().map(|r| r.hash.as_str()).collect();
        assert_eq!(order, repeat);
    }

    #[test]
    fn test_summary() {
        let engine = ReconciliationEngine::default();
        let ledger = source(&[("h1", dec!(100)), ("h2", dec!(50)), ("h3", dec!(25))]);
        let chain = source(&[("h1", dec!(100)), ("h2", dec!(60)), ("h4", dec!(5))]);

        let records = engine.reconcile(&ledger, &chain);
        let summary = engine.summarize(&records);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.amount_different, 1);
        assert_eq!(summary.only_in_ledger, 1);
        assert_eq!(summary.only_in_chain, 1);
        assert_eq!(summary.total_difference, dec!(40));
        assert!((summary.match_rate - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_chain_amount_map_prefers_signed_amounts() {
        use crate::models::transfer::{Direction, TransferKind};

        let transfer = CanonicalTransfer {
            hash: "h1".to_string(),
            block_number: None,
            block_timestamp: 0,
            token_symbol: "USDT".to_string(),
            token_name: "Tether USD".to_string(),
            contract_address: String::new(),
            transfer_kind: TransferKind::Trc20,
            raw_amount: "100000000".to_string(),
            formatted_amount: dec!(100),
            unit_price_usd: dec!(1),
            value_usd: dec!(100),
            from_address: String::new(),
            to_address: String::new(),
            status: "SUCCESS".to_string(),
            date_formatted: String::new(),
            direction: Some(Direction::Out),
            signed_amount: Some(dec!(-100)),
        };

        let map = chain_amount_map(&[transfer]);
        assert_eq!(map["h1"].amount, dec!(-100));
        assert_eq!(map["h1"].row, Some(1));
    }
}
