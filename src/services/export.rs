//! Tabular record sinks. The core emits plain ordered records; the CSV
//! sink owns file naming and nothing else.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::reconciliation::{ReconciliationRecord, ReconciliationSummary};
use crate::models::transfer::CanonicalTransfer;

#[derive(Debug)]
pub enum ExportError {
    Io(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Io(msg) => write!(f, "export error: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Io(e.to_string())
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e.to_string())
    }
}

pub trait RecordSink {
    fn write_transfers(&self, transfers: &[CanonicalTransfer]) -> Result<usize, ExportError>;

    fn write_reconciliation(
        &self,
        records: &[ReconciliationRecord],
        summary: &ReconciliationSummary,
    ) -> Result<usize, ExportError>;
}

/// Writes one batch-stamped CSV file per record set under an output
/// directory, like the original per-batch workbook layout.
pub struct CsvSink {
    output_dir: PathBuf,
    batch_id: String,
}

impl CsvSink {
    pub fn new(output_dir: &Path, batch_id: &str) -> Result<Self, ExportError> {
        std::fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            batch_id: batch_id.to_string(),
        })
    }

    pub fn transfers_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_transfers.csv", self.batch_id))
    }

    pub fn exceptions_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_exceptions.csv", self.batch_id))
    }
}

impl RecordSink for CsvSink {
    fn write_transfers(&self, transfers: &[CanonicalTransfer]) -> Result<usize, ExportError> {
        let path = self.transfers_path();
        let written = write_transfers_csv(File::create(&path)?, transfers)?;
        tracing::info!("Wrote {} transfers to {}", written, path.display());
        Ok(written)
    }

    fn write_reconciliation(
        &self,
        records: &[ReconciliationRecord],
        summary: &ReconciliationSummary,
    ) -> Result<usize, ExportError> {
        let path = self.exceptions_path();
        let written = write_reconciliation_csv(File::create(&path)?, records, summary)?;
        tracing::info!("Wrote {} exceptions to {}", written, path.display());
        Ok(written)
    }
}

pub fn write_transfers_csv<W: Write>(
    writer: W,
    transfers: &[CanonicalTransfer],
) -> Result<usize, ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "hash",
        "block_number",
        "timestamp",
        "date",
        "from_address",
        "to_address",
        "token_symbol",
        "token_name",
        "contract_address",
        "transaction_type",
        "status",
        "raw_amount",
        "amount",
        "unit_price_usd",
        "value_usd",
        "direction",
        "signed_amount",
    ])?;

    for transfer in transfers {
        let block_number = transfer
            .block_number
            .map(|b| b.to_string())
            .unwrap_or_default();
        let timestamp = transfer.block_timestamp.to_string();
        let amount = transfer.formatted_amount.to_string();
        let unit_price_usd = transfer.unit_price_usd.to_string();
        let value_usd = transfer.value_usd.to_string();
        let signed_amount = transfer
            .signed_amount
            .map(|a| a.to_string())
            .unwrap_or_default();

        csv_writer.write_record([
            transfer.hash.as_str(),
            block_number.as_str(),
            timestamp.as_str(),
            transfer.date_formatted.as_str(),
            transfer.from_address.as_str(),
            transfer.to_address.as_str(),
            transfer.token_symbol.as_str(),
            transfer.token_name.as_str(),
            transfer.contract_address.as_str(),
            transfer.transfer_kind.as_str(),
            transfer.status.as_str(),
            transfer.raw_amount.as_str(),
            amount.as_str(),
            unit_price_usd.as_str(),
            value_usd.as_str(),
            transfer.direction.map(|d| d.as_str()).unwrap_or(""),
            signed_amount.as_str(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(transfers.len())
}

pub fn write_reconciliation_csv<W: Write>(
    writer: W,
    records: &[ReconciliationRecord],
    summary: &ReconciliationSummary,
) -> Result<usize, ExportError> {
    // The trailing summary rows are shorter than the data rows.
    let mut csv_writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);

    csv_writer.write_record([
        "hash",
        "outcome",
        "ledger_amount",
        "chain_amount",
        "difference",
        "ledger_row",
        "chain_row",
        "severity",
        "notes",
    ])?;

    for record in records {
        let ledger_amount = record.ledger_amount.to_string();
        let chain_amount = record.chain_amount.to_string();
        let difference = record.difference.to_string();
        let ledger_row = record
            .ledger_row
            .map(|r| r.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let chain_row = record
            .chain_row
            .map(|r| r.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        csv_writer.write_record([
            record.hash.as_str(),
            record.outcome.as_str(),
            ledger_amount.as_str(),
            chain_amount.as_str(),
            difference.as_str(),
            ledger_row.as_str(),
            chain_row.as_str(),
            record.severity.as_str(),
            record.notes.as_str(),
        ])?;
    }

    csv_writer.write_record([""])?;
    csv_writer.write_record(["SUMMARY"])?;
    for (label, value) in [
        ("MATCHED", summary.matched.to_string()),
        ("AMOUNT_DIFFERENT", summary.amount_different.to_string()),
        ("ONLY_IN_LEDGER", summary.only_in_ledger.to_string()),
        ("ONLY_IN_CHAIN", summary.only_in_chain.to_string()),
        ("TOTAL_DIFFERENCE", summary.total_difference.to_string()),
        ("MATCH_RATE", format!("{:.1}%", summary.match_rate)),
    ] {
        csv_writer.write_record([label, value.as_str()])?;
    }

    csv_writer.flush()?;
    Ok(records.len())
}
