//! Conversion between human decimal prices and the contract's base unit.

use alloy_primitives::U256;
use alloy_primitives::utils::{ParseUnits, format_units, parse_units};

use crate::error::WalletError;

/// Unit exponent of the Land Registry currency (ether -> wei)
pub const ETHER_EXPONENT: u8 = 18;

/// Converts a decimal price such as `"1.5"` into base units.
///
/// Scaling is done on the decimal string, so every input with at most `exponent`
/// fractional digits converts exactly. Extra fractional digits are accepted only
/// when they are zeros; anything that would need rounding, negative values and
/// non-numeric input is rejected.
pub fn to_base_units(amount: &str, exponent: u8) -> Result<U256, WalletError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(WalletError::InvalidAmount("price is empty".to_string()));
    }
    if amount.starts_with('-') {
        return Err(WalletError::InvalidAmount(format!(
            "price must not be negative: {amount}"
        )));
    }
    // parse_units tolerates separators such as `_`; prices are plain decimals
    let is_decimal = amount.chars().all(|c| c.is_ascii_digit() || c == '.')
        && amount.matches('.').count() <= 1
        && amount.chars().any(|c| c.is_ascii_digit());
    if !is_decimal {
        return Err(WalletError::InvalidAmount(format!(
            "price is not a decimal number: {amount}"
        )));
    }

    let normalized = match amount.split_once('.') {
        Some((whole, fraction)) if fraction.len() > usize::from(exponent) => {
            let (kept, dropped) = fraction.split_at(usize::from(exponent));
            if dropped.chars().any(|c| c != '0') {
                return Err(WalletError::InvalidAmount(format!(
                    "{amount} has more than {exponent} decimal places"
                )));
            }
            if kept.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{kept}")
            }
        }
        _ => amount.to_string(),
    };

    match parse_units(&normalized, exponent) {
        Ok(ParseUnits::U256(value)) => Ok(value),
        Ok(ParseUnits::I256(_)) => Err(WalletError::InvalidAmount(format!(
            "price must not be negative: {amount}"
        ))),
        Err(e) => Err(WalletError::InvalidAmount(format!("{amount}: {e}"))),
    }
}

/// Converts a base unit amount back to a trimmed decimal string (`1500000000000000000` -> `"1.5"`).
pub fn format_base_units(value: U256, exponent: u8) -> String {
    let formatted = format_units(value, exponent).unwrap_or_else(|_| value.to_string());
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_scaling() {
        assert_eq!(
            to_base_units("1.5", ETHER_EXPONENT).unwrap().to_string(),
            "1500000000000000000"
        );
        assert_eq!(
            to_base_units("0.000000000000000001", ETHER_EXPONENT).unwrap(),
            U256::from(1u64)
        );
        assert_eq!(
            to_base_units("123456789.123456789123456789", ETHER_EXPONENT)
                .unwrap()
                .to_string(),
            "123456789123456789123456789"
        );
        assert_eq!(to_base_units("2", 6).unwrap(), U256::from(2_000_000u64));
        assert_eq!(to_base_units(" 0.25 ", 2).unwrap(), U256::from(25u64));
    }

    #[test]
    fn test_zero_padding_beyond_exponent_is_accepted() {
        assert_eq!(to_base_units("1.50000", 2).unwrap(), U256::from(150u64));
        assert_eq!(to_base_units("7.000", 0).unwrap(), U256::from(7u64));
    }

    #[test]
    fn test_rejects_unrepresentable_input() {
        assert!(matches!(
            to_base_units("0.0000000000000000001", ETHER_EXPONENT),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            to_base_units("-1", ETHER_EXPONENT),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            to_base_units("", ETHER_EXPONENT),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            to_base_units("one ether", ETHER_EXPONENT),
            Err(WalletError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_rejects_non_decimal_characters() {
        for input in ["1_000", "1e18", "0x10", "+1", "1.2.3", ".", "1 000"] {
            assert!(
                matches!(
                    to_base_units(input, ETHER_EXPONENT),
                    Err(WalletError::InvalidAmount(_))
                ),
                "{input} should be rejected"
            );
        }
        assert_eq!(
            to_base_units(".5", ETHER_EXPONENT).unwrap(),
            U256::from(500_000_000_000_000_000u64)
        );
        assert_eq!(
            to_base_units("1.", ETHER_EXPONENT).unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_format_trims_trailing_zeros() {
        assert_eq!(
            format_base_units(U256::from(1_500_000_000_000_000_000u64), ETHER_EXPONENT),
            "1.5"
        );
        assert_eq!(
            format_base_units(U256::from(2_000_000_000_000_000_000u64), ETHER_EXPONENT),
            "2"
        );
    }
}
