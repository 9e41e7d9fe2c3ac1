use rust_decimal::Decimal;
use serde::Serialize;

/// Transaction kind, classified from the TronScan contract-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferKind {
    /// TransferContract (code 1), native TRX movement.
    Native,
    /// TriggerSmartContract (code 31), TRC20 token transfer.
    Trc20,
    /// TransferAssetContract (code 2), TRC10 asset transfer.
    Trc10,
}

impl TransferKind {
    pub fn from_contract_type(code: i32, has_token_transfers: bool) -> Self {
        match code {
            1 => TransferKind::Native,
            2 => TransferKind::Trc10,
            31 => TransferKind::Trc20,
            // Unknown codes classify by payload shape.
            _ if has_token_transfers => TransferKind::Trc20,
            _ => TransferKind::Native,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Native => "TRX",
            TransferKind::Trc20 => "TRC20",
            TransferKind::Trc10 => "TRC10",
        }
    }
}

/// Direction of a transfer relative to a reference wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    In,
    Out,
    Unknown,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
            Direction::Unknown => "UNKNOWN",
        }
    }
}

/// One normalized ledger line. A raw transaction expands into one record
/// per token transfer, or a single synthetic native transfer.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalTransfer {
    pub hash: String,
    pub block_number: Option<i64>,
    pub block_timestamp: i64,
    pub token_symbol: String,
    pub token_name: String,
    pub contract_address: String,
    pub transfer_kind: TransferKind,
    /// Original scaled integer string, preserved for audit.
    pub raw_amount: String,
    /// Exact value: raw_amount / 10^decimals.
    pub formatted_amount: Decimal,
    pub unit_price_usd: Decimal,
    pub value_usd: Decimal,
    pub from_address: String,
    pub to_address: String,
    pub status: String,
    pub date_formatted: String,
    /// Set only when a reference wallet was supplied.
    pub direction: Option<Direction>,
    /// Negative for Out, positive for In, absent for Unknown.
    pub signed_amount: Option<Decimal>,
}
