//! CSV-backed record store for the two manual tables: the wallet registry
//! and the submitted ledger (form export).
//!
//! Column resolution is an explicit mapping validated at load time. A
//! source whose hash or amount column cannot be resolved is a structural
//! error for that source; the engine must not silently treat it as empty.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::models::reconciliation::SourceRecord;
use crate::services::amount;
use crate::services::hash;

#[derive(Debug)]
pub enum LedgerError {
    Io(String),
    MissingColumn { table: String, column: String },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Io(msg) => write!(f, "ledger I/O error: {}", msg),
            LedgerError::MissingColumn { table, column } => write!(
                f,
                "no '{}' column found in {}; cannot reconcile this source",
                column, table
            ),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Logical-field → column-header mapping for the ledger table.
#[derive(Debug, Clone)]
pub struct LedgerColumns {
    pub hash: String,
    pub amount: String,
    pub category: Option<String>,
}

impl Default for LedgerColumns {
    fn default() -> Self {
        Self {
            hash: "txn_hash".to_string(),
            amount: "amount".to_string(),
            category: Some("category".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalletRecord {
    pub name: String,
    pub company: String,
    pub address: String,
}

pub struct LedgerStore {
    columns: LedgerColumns,
    positive_categories: HashSet<String>,
}

impl LedgerStore {
    pub fn new(columns: LedgerColumns) -> Self {
        Self {
            columns,
            positive_categories: amount::default_positive_categories(),
        }
    }

    /// Override the positive-forcing category set (business configuration).
    pub fn with_positive_categories(mut self, categories: HashSet<String>) -> Self {
        self.positive_categories = categories;
        self
    }

    pub fn load_entries_from_path(
        &self,
        path: &Path,
        table: &str,
    ) -> Result<HashMap<String, SourceRecord>, LedgerError> {
        let file = std::fs::File::open(path)
            .map_err(|e| LedgerError::Io(format!("{}: {}", path.display(), e)))?;
        self.load_entries(file, table)
    }

    /// Load the ledger table into a hash-keyed amount map.
    ///
    /// Hashes are canonicalized; rows with an empty hash cell (and the
    /// trailing TOTAL summary row some exports carry) are skipped; amounts
    /// go through the category sign policy. Duplicate hashes keep the
    /// later row, dict-style.
    pub fn load_entries<R: Read>(
        &self,
        reader: R,
        table: &str,
    ) -> Result<HashMap<String, SourceRecord>, LedgerError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader
            .headers()
            .map_err(|e| LedgerError::Io(e.to_string()))?
            .clone();

        let hash_idx = find_column(&headers, &self.columns.hash).ok_or_else(|| {
            LedgerError::MissingColumn {
                table: table.to_string(),
                column: self.columns.hash.clone(),
            }
        })?;
        let amount_idx = find_column(&headers, &self.columns.amount).ok_or_else(|| {
            LedgerError::MissingColumn {
                table: table.to_string(),
                column: self.columns.amount.clone(),
            }
        })?;
        let category_idx = match &self.columns.category {
            Some(column) => {
                let idx = find_column(&headers, column);
                if idx.is_none() {
                    tracing::warn!(
                        "No '{}' column in {}; applying the default sign rule to every row",
                        column,
                        table
                    );
                }
                idx
            }
            None => None,
        };

        let mut entries: HashMap<String, SourceRecord> = HashMap::new();
        let mut skipped_empty_hash = 0usize;

        for (index, result) in csv_reader.records().enumerate() {
            let row_number = index + 2; // row 1 is the header
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping unreadable row {} in {}: {}", row_number, table, e);
                    continue;
                }
            };

            let raw_hash = record.get(hash_idx).unwrap_or("").trim();
            if raw_hash.is_empty() {
                skipped_empty_hash += 1;
                continue;
            }
            if raw_hash.eq_ignore_ascii_case("TOTAL") {
                continue;
            }

            let canonical_hash = hash::extract(raw_hash);
            let raw_amount = record.get(amount_idx).unwrap_or("");
            let category = category_idx
                .and_then(|idx| record.get(idx))
                .unwrap_or("");
            let amount = amount::ledger_amount(raw_amount, category, &self.positive_categories);

            if entries
                .insert(
                    canonical_hash.clone(),
                    SourceRecord::with_row(amount, row_number),
                )
                .is_some()
            {
                tracing::warn!(
                    "Duplicate hash {} in {} (row {}), keeping the later row",
                    canonical_hash,
                    table,
                    row_number
                );
            }
        }

        if skipped_empty_hash > 0 {
            tracing::info!(
                "Skipped {} rows with an empty hash cell in {}",
                skipped_empty_hash,
                table
            );
        }
        tracing::info!("Loaded {} entries from {}", entries.len(), table);

        Ok(entries)
    }
}

pub fn load_wallets_from_path(path: &Path) -> Result<Vec<WalletRecord>, LedgerError> {
    let file = std::fs::File::open(path)
        .map_err(|e| LedgerError::Io(format!("{}: {}", path.display(), e)))?;
    load_wallets(file)
}

/// Load the wallet registry. Rows with a malformed address are skipped
/// with a warning; name and company are optional columns.
pub fn load_wallets<R: Read>(reader: R) -> Result<Vec<WalletRecord>, LedgerError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader
        .headers()
        .map_err(|e| LedgerError::Io(e.to_string()))?
        .clone();

    let address_idx =
        find_column(&headers, "address").ok_or_else(|| LedgerError::MissingColumn {
            table: "wallet registry".to_string(),
            column: "address".to_string(),
        })?;
    let name_idx = find_column(&headers, "wallet_name");
    let company_idx = find_column(&headers, "company");

    let mut wallets = Vec::new();

    for (index, result) in csv_reader.records().enumerate() {
        let row_number = index + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping unreadable wallet row {}: {}", row_number, e);
                continue;
            }
        };

        let address = record.get(address_idx).unwrap_or("").trim().to_string();
        if address.is_empty() {
            continue;
        }
        if !validate_address(&address) {
            tracing::warn!("Invalid address format in row {}: {}", row_number, address);
            continue;
        }

        wallets.push(WalletRecord {
            name: field(&record, name_idx),
            company: field(&record, company_idx),
            address,
        });
    }

    tracing::info!("Loaded {} wallet records", wallets.len());
    Ok(wallets)
}

/// Tron base58 addresses start with 'T' and are 34 characters long.
pub fn validate_address(address: &str) -> bool {
    address.len() == 34 && address.starts_with('T')
}

fn field(record: &csv::StringRecord, idx: Option<usize>) -> String {
    idx.and_then(|i| record.get(i))
        .unwrap_or("")
        .trim()
        .to_string()
}

// Header comparison is case-insensitive and treats spaces as underscores,
// so "Wallet Name" resolves for "wallet_name".
fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    let wanted = normalize_header(name);
    headers.iter().position(|h| normalize_header(h) == wanted)
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HASH_A: &str = "1dad52d991ba6963777ae069276e01d67ba6e9786811739cb463b405c51a2213";
    const HASH_B: &str = "2b62f0a8f0285cfb0ec0e3a5d2b09150656cbcb27b75a9b7d21ac8a05c719f31";

    fn store() -> LedgerStore {
        LedgerStore::new(LedgerColumns::default())
    }

    #[test]
    fn test_load_entries_with_sign_policy() {
        let csv_data = format!(
            "Txn_Hash,Amount,Category\n\
             {},\"1,234.50\",REFUND\n\
             https://tronscan.org/#/transaction/{},500.00,OFFICE SUPPLIES\n",
            HASH_A, HASH_B
        );

        let entries = store().load_entries(csv_data.as_bytes(), "ledger").unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[HASH_A].amount, dec!(1234.50));
        assert_eq!(entries[HASH_A].row, Some(2));
        // URL canonicalized, default category sign is negative.
        assert_eq!(entries[HASH_B].amount, dec!(-500.00));
    }

    #[test]
    fn test_empty_hash_and_total_rows_skipped() {
        let csv_data = format!(
            "txn_hash,amount,category\n\
             ,100.00,REFUND\n\
             TOTAL,999.99,\n\
             {},10.00,REFUND\n",
            HASH_A
        );

        let entries = store().load_entries(csv_data.as_bytes(), "ledger").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[HASH_A].amount, dec!(10.00));
    }

    #[test]
    fn test_duplicate_hash_keeps_later_row() {
        let csv_data = format!(
            "txn_hash,amount,category\n\
             {h},10.00,REFUND\n\
             {h},20.00,REFUND\n",
            h = HASH_A
        );

        let entries = store().load_entries(csv_data.as_bytes(), "ledger").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[HASH_A].amount, dec!(20.00));
        assert_eq!(entries[HASH_A].row, Some(3));
    }

    #[test]
    fn test_missing_hash_column_is_structural() {
        let csv_data = "reference,amount\nabc,100.00\n";

        let err = store()
            .load_entries(csv_data.as_bytes(), "ledger")
            .unwrap_err();

        match err {
            LedgerError::MissingColumn { ref column, .. } => assert_eq!(column, "txn_hash"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
        assert!(err.to_string().contains("no 'txn_hash' column"));
    }

    #[test]
    fn test_missing_category_column_degrades_to_default_sign() {
        let csv_data = format!("txn_hash,amount\n{},100.00\n", HASH_A);

        let entries = store().load_entries(csv_data.as_bytes(), "ledger").unwrap();
        assert_eq!(entries[HASH_A].amount, dec!(-100.00));
    }

    #[test]
    fn test_load_wallets_validates_addresses() {
        let csv_data = "Wallet Name,Company,Address\n\
                        Treasury,Acme,TRaa8yHXzJ5FoVqJNxzBFtbUNKaVwXx5E1\n\
                        Bad,Acme,0xdeadbeef\n\
                        ,,\n";

        let wallets = load_wallets(csv_data.as_bytes()).unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].name, "Treasury");
        assert_eq!(wallets[0].address, "TRaa8yHXzJ5FoVqJNxzBFtbUNKaVwXx5E1");
    }

    #[test]
    fn test_load_wallets_requires_address_column() {
        let csv_data = "Wallet Name,Company\nTreasury,Acme\n";
        assert!(matches!(
            load_wallets(csv_data.as_bytes()),
            Err(LedgerError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("TRaa8yHXzJ5FoVqJNxzBFtbUNKaVwXx5E1"));
        assert!(!validate_address("TRaa8yHXzJ5FoVqJNxzBFtbUNKaVwXx5E")); // 33 chars
        assert!(!validate_address("XRaa8yHXzJ5FoVqJNxzBFtbUNKaVwXx5E1"));
    }
}
