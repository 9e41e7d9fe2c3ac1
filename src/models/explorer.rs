use serde::Deserialize;
use serde_json::Value;

/// Page envelope returned by the TronScan `/transaction` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPage {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub data: Vec<RawTransaction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub block: Option<i64>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(rename = "contractType", default)]
    pub contract_type: i32,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(rename = "contractData", default)]
    pub contract_data: Option<ContractData>,
    #[serde(rename = "ownerAddress", default)]
    pub owner_address: String,
    #[serde(rename = "toAddress", default)]
    pub to_address: String,
    #[serde(rename = "trc20TransferInfo", default)]
    pub trc20_transfer_info: Vec<RawTokenTransfer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractData {
    #[serde(default)]
    pub amount: Option<Value>,
}

/// One structured token movement inside a transaction
/// (`trc20TransferInfo` entry; fields are snake_case in the payload).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTokenTransfer {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub amount_str: String,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub to_address: String,
}

impl RawTransaction {
    /// Top-level native amount, checked in order: `amount`, `value`,
    /// `contractData.amount`. Defaults to "0" when none is present.
    pub fn top_level_value(&self) -> String {
        self.amount
            .as_ref()
            .and_then(value_as_amount_string)
            .or_else(|| self.value.as_ref().and_then(value_as_amount_string))
            .or_else(|| {
                self.contract_data
                    .as_ref()
                    .and_then(|d| d.amount.as_ref())
                    .and_then(value_as_amount_string)
            })
            .unwrap_or_else(|| "0".to_string())
    }
}

// Amount fields come back as either strings or bare numbers depending on
// the endpoint.
fn value_as_amount_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_value_order() {
        let tx = RawTransaction {
            amount: Some(json!("1500000")),
            value: Some(json!("999")),
            ..Default::default()
        };
        assert_eq!(tx.top_level_value(), "1500000");

        let tx = RawTransaction {
            value: Some(json!(2500000)),
            ..Default::default()
        };
        assert_eq!(tx.top_level_value(), "2500000");

        let tx = RawTransaction {
            contract_data: Some(ContractData {
                amount: Some(json!("42")),
            }),
            ..Default::default()
        };
        assert_eq!(tx.top_level_value(), "42");

        let tx = RawTransaction::default();
        assert_eq!(tx.top_level_value(), "0");
    }

    #[test]
    fn test_deserialize_explorer_payload() {
        let tx: RawTransaction = serde_json::from_value(json!({
            "hash": "ab".repeat(32),
            "block": 61234567,
            "timestamp": 1721001600000i64,
            "confirmed": true,
            "contractType": 31,
            "ownerAddress": "TSender111111111111111111111111111",
            "toAddress": "TReceiver1111111111111111111111111",
            "trc20TransferInfo": [{
                "symbol": "usdt",
                "name": "Tether USD",
                "contract_address": "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t",
                "amount_str": "123450000",
                "decimals": 6,
                "from_address": "TSender111111111111111111111111111",
                "to_address": "TReceiver1111111111111111111111111"
            }]
        }))
        .unwrap();

        assert_eq!(tx.contract_type, 31);
        assert_eq!(tx.trc20_transfer_info.len(), 1);
        assert_eq!(tx.trc20_transfer_info[0].amount_str, "123450000");
        assert_eq!(tx.trc20_transfer_info[0].decimals, Some(6));
    }

    #[test]
    fn test_missing_fields_default() {
        let tx: RawTransaction = serde_json::from_value(json!({
            "hash": "cd".repeat(32),
            "timestamp": 1721001600000i64
        }))
        .unwrap();

        assert!(!tx.confirmed);
        assert!(tx.trc20_transfer_info.is_empty());
        assert_eq!(tx.top_level_value(), "0");
    }
}
