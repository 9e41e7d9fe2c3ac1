//! Scaled-integer amount conversion and the manual-ledger sign policy.

use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug)]
pub enum AmountError {
    Invalid(String),
    UnsupportedDecimals(u32),
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Invalid(raw) => write!(f, "invalid amount string: '{}'", raw),
            AmountError::UnsupportedDecimals(d) => write!(f, "unsupported decimals: {}", d),
        }
    }
}

impl std::error::Error for AmountError {}

/// Convert a scaled integer amount into its exact decimal value:
/// `raw_amount / 10^decimals`.
///
/// Empty and "0" inputs convert to zero (a common, expected case on
/// explorer payloads). Non-numeric input after cleaning is an error;
/// callers in the batch path downgrade it to zero with a warning.
pub fn convert(raw_amount: &str, decimals: u32) -> Result<Decimal, AmountError> {
    let cleaned = clean(raw_amount);
    if cleaned.is_empty() || cleaned == "0" {
        return Ok(Decimal::ZERO);
    }

    let value: Decimal = cleaned
        .parse()
        .map_err(|_| AmountError::Invalid(raw_amount.to_string()))?;

    // 1 * 10^-decimals; multiplying keeps the conversion exact.
    let scale =
        Decimal::try_new(1, decimals).map_err(|_| AmountError::UnsupportedDecimals(decimals))?;

    value
        .checked_mul(scale)
        .ok_or_else(|| AmountError::Invalid(raw_amount.to_string()))
}

/// Parse a manually entered ledger amount and apply the sign policy.
///
/// Accounting-style parentheses force the amount negative regardless of
/// category. Otherwise the category decides: members of the
/// positive-forcing set keep the magnitude positive, every other category
/// is treated as an outflow and forced negative. Unparseable input becomes
/// zero with a warning so one bad row never aborts a batch.
pub fn ledger_amount(
    raw_amount: &str,
    category: &str,
    positive_categories: &HashSet<String>,
) -> Decimal {
    let cleaned = clean(raw_amount);
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    let bracketed = cleaned.starts_with('(') && cleaned.ends_with(')');
    let magnitude = if bracketed {
        cleaned.trim_matches(|c| c == '(' || c == ')')
    } else {
        cleaned.as_str()
    };

    match magnitude.parse::<Decimal>() {
        Ok(value) => {
            if bracketed {
                -value.abs()
            } else if positive_categories.contains(&category.trim().to_uppercase()) {
                value.abs()
            } else {
                -value.abs()
            }
        }
        Err(_) => {
            tracing::warn!(
                "Could not parse amount '{}' for category '{}', treating as 0",
                raw_amount,
                category
            );
            Decimal::ZERO
        }
    }
}

/// Categories whose entries stay positive (inbound legs). Everything else
/// defaults to negative, double-entry style. The membership is business
/// configuration, overridable per ledger load.
pub fn default_positive_categories() -> HashSet<String> {
    [
        "MARKETING - REIMBURSEMENT",
        "EXPENSE - REIMBURSEMENT",
        "REFUND",
        "CHARGEBACK",
        "WITHDRAWAL",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

// Strips thousands separators, currency symbols and all whitespace.
fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ',' | '$') && !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_convert_exact_across_decimals() {
        assert_eq!(convert("12345", 0).unwrap(), dec!(12345));
        assert_eq!(convert("123450000", 6).unwrap(), dec!(123.45));
        assert_eq!(convert("12345678", 8).unwrap(), dec!(0.12345678));
        assert_eq!(convert("1000000000000000000", 18).unwrap(), dec!(1));
        assert_eq!(convert("1", 18).unwrap(), dec!(0.000000000000000001));
    }

    #[test]
    fn test_convert_round_trip() {
        // convert(amount * 10^decimals, decimals) == amount
        for (scaled, decimals, expected) in [
            ("250000000", 6, dec!(250)),
            ("1999999", 6, dec!(1.999999)),
            ("123456789012345678", 18, dec!(0.123456789012345678)),
        ] {
            assert_eq!(convert(scaled, decimals).unwrap(), expected);
        }
    }

    #[test]
    fn test_convert_empty_and_zero() {
        assert_eq!(convert("", 6).unwrap(), Decimal::ZERO);
        assert_eq!(convert("0", 6).unwrap(), Decimal::ZERO);
        assert_eq!(convert("   ", 6).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_convert_strips_separators() {
        assert_eq!(convert("1,234,567", 0).unwrap(), dec!(1234567));
        assert_eq!(convert("$1,000", 2).unwrap(), dec!(10));
    }

    #[test]
    fn test_convert_invalid() {
        assert!(convert("not-a-number", 6).is_err());
        assert!(convert("12.34.56", 6).is_err());
    }

    #[test]
    fn test_ledger_amount_category_sign() {
        let positive = default_positive_categories();

        assert_eq!(ledger_amount("123.45", "REFUND", &positive), dec!(123.45));
        assert_eq!(
            ledger_amount("123.45", "marketing - reimbursement", &positive),
            dec!(123.45)
        );
        assert_eq!(
            ledger_amount("123.45", "OFFICE SUPPLIES", &positive),
            dec!(-123.45)
        );
        assert_eq!(ledger_amount("123.45", "", &positive), dec!(-123.45));
    }

    #[test]
    fn test_ledger_amount_parentheses_win_over_category() {
        let positive = default_positive_categories();

        assert_eq!(ledger_amount("(123.45)", "REFUND", &positive), dec!(-123.45));
        assert_eq!(
            ledger_amount("($1,000.00)", "ANYTHING", &positive),
            dec!(-1000.00)
        );
    }

    #[test]
    fn test_ledger_amount_bad_input_is_zero() {
        let positive = default_positive_categories();

        assert_eq!(ledger_amount("", "REFUND", &positive), Decimal::ZERO);
        assert_eq!(ledger_amount("n/a", "REFUND", &positive), Decimal::ZERO);
        assert_eq!(ledger_amount("()", "REFUND", &positive), Decimal::ZERO);
    }
}
