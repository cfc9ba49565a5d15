//! Decimal amount parsing and formatting
//!
//! Amounts are entered as decimal strings in whole units (`"0.01"` ETH,
//! `"2.5"` USDC) and carried internally in base units.

use crate::error::{BridgeError, BridgeResult};

pub const ETH_DECIMALS: u8 = 18;
pub const USDC_DECIMALS: u8 = 6;

/// Largest exponent whose power of ten fits in a u128
const MAX_DECIMALS: u8 = 38;

/// Parse a decimal string into base units with `decimals` fractional digits
pub fn parse_units(amount: &str, decimals: u8) -> BridgeResult<u128> {
    if decimals > MAX_DECIMALS {
        return Err(BridgeError::InvalidAmount(format!("{} decimals is not supported", decimals)));
    }

    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::InvalidAmount("empty amount".to_string()));
    }

    let (integer_str, fractional_str) = match trimmed.split_once('.') {
        Some((integer, fractional)) => (integer, fractional),
        None => (trimmed, ""),
    };

    if integer_str.is_empty() && fractional_str.is_empty() {
        return Err(BridgeError::InvalidAmount(format!("no digits in {:?}", amount)));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(integer_str) || !all_digits(fractional_str) {
        return Err(BridgeError::InvalidAmount(format!("not a decimal number: {:?}", amount)));
    }

    if fractional_str.len() > decimals as usize {
        return Err(BridgeError::InvalidAmount(format!(
            "too many decimal places in {}: at most {}",
            trimmed, decimals
        )));
    }

    let overflow = || BridgeError::InvalidAmount(format!("amount {} is too large", trimmed));

    let integer: u128 = if integer_str.is_empty() {
        0
    } else {
        integer_str.parse().map_err(|_| overflow())?
    };

    // Pad fractional part to full precision
    let padded = format!("{:0<width$}", fractional_str, width = decimals as usize);
    let fractional: u128 = if padded.is_empty() { 0 } else { padded.parse().map_err(|_| overflow())? };

    integer
        .checked_mul(10u128.pow(decimals as u32))
        .and_then(|v| v.checked_add(fractional))
        .ok_or_else(overflow)
}

/// Format base units as a decimal string without trailing zeros
pub fn format_units(raw: u128, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let decimals = decimals.min(MAX_DECIMALS);
    let divisor = 10u128.pow(decimals as u32);
    let integer = raw / divisor;
    let fractional = raw % divisor;

    if fractional == 0 {
        integer.to_string()
    } else {
        let frac_str = format!("{:0>width$}", fractional, width = decimals as usize);
        format!("{}.{}", integer, frac_str.trim_end_matches('0'))
    }
}

pub fn parse_ether(amount: &str) -> BridgeResult<u128> {
    parse_units(amount, ETH_DECIMALS)
}

pub fn format_ether(wei: u128) -> String {
    format_units(wei, ETH_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ether() {
        assert_eq!(parse_ether("0.01").unwrap(), 10_000_000_000_000_000);
        assert_eq!(parse_ether("1").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(parse_ether(".5").unwrap(), 500_000_000_000_000_000);
        assert_eq!(parse_ether(" 2. ").unwrap(), 2_000_000_000_000_000_000);
    }

    #[test]
    fn test_parse_usdc() {
        assert_eq!(parse_units("2.5", USDC_DECIMALS).unwrap(), 2_500_000);
        assert_eq!(parse_units("0.000001", USDC_DECIMALS).unwrap(), 1);
    }

    #[test]
    fn test_too_many_decimals() {
        let err = parse_units("0.0000001", USDC_DECIMALS).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidAmount(_)));
    }

    #[test]
    fn test_rejects_garbage() {
        for bad in ["", ".", "1.2.3", "-1", "1e18", "0x10", "abc"] {
            assert!(parse_ether(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_overflow() {
        assert!(parse_ether("1000000000000000000000000").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_ether(10_000_000_000_000_000), "0.01");
        assert_eq!(format_ether(0), "0");
        assert_eq!(format_units(2_500_000, USDC_DECIMALS), "2.5");
        assert_eq!(format_units(42, 0), "42");
    }
}
