use crate::error::{AppError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::dec;

/// Absorbs rounding noise between the two feeds.
pub const DEFAULT_BALANCE_TOLERANCE: Decimal = dec!(0.01);

/// Closing balances reported by both feeds and how far apart they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    pub bank_balance: Decimal,
    pub pos_balance: Decimal,
    /// `bank_balance - pos_balance`
    pub delta: Decimal,
    pub tolerance: Decimal,
    pub significant: bool,
}

impl BalanceDelta {
    /// Delta with an explicit `+` for positive values, two decimal places
    pub fn signed_delta(&self) -> String {
        if self.delta > Decimal::ZERO {
            format!("+{:.2}", self.delta)
        } else {
            format!("{:.2}", self.delta)
        }
    }
}

pub fn compare_balances(
    bank_balance: Decimal,
    pos_balance: Decimal,
    tolerance: Decimal,
) -> Result<BalanceDelta> {
    if tolerance.is_sign_negative() && !tolerance.is_zero() {
        return Err(AppError::InvalidInput(format!(
            "balance tolerance must not be negative, got {}",
            tolerance
        )));
    }

    let delta = bank_balance - pos_balance;

    Ok(BalanceDelta {
        bank_balance,
        pos_balance,
        delta,
        tolerance,
        significant: delta.abs() > tolerance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_significant_delta() {
        let result = compare_balances(dec!(100.00), dec!(95.00), dec!(1.00)).unwrap();

        assert_eq!(result.delta, dec!(5.00));
        assert!(result.significant);
    }

    #[test]
    fn test_compare_negligible_delta() {
        let result = compare_balances(dec!(100.00), dec!(99.50), dec!(1.00)).unwrap();

        assert_eq!(result.delta, dec!(0.50));
        assert!(!result.significant);
    }

    #[test]
    fn test_compare_delta_sign_follows_bank_minus_pos() {
        let result = compare_balances(dec!(95.00), dec!(100.00), dec!(1.00)).unwrap();

        assert_eq!(result.delta, dec!(-5.00));
        assert!(result.significant);
        assert_eq!(result.bank_balance, dec!(95.00));
        assert_eq!(result.pos_balance, dec!(100.00));
    }

    #[test]
    fn test_compare_delta_equal_to_tolerance_is_negligible() {
        let result = compare_balances(dec!(10.01), dec!(10.00), DEFAULT_BALANCE_TOLERANCE).unwrap();

        assert_eq!(result.delta, dec!(0.01));
        assert!(!result.significant);
    }

    #[test]
    fn test_compare_default_tolerance_catches_two_cents() {
        let result = compare_balances(dec!(10.02), dec!(10.00), DEFAULT_BALANCE_TOLERANCE).unwrap();

        assert!(result.significant);
    }

    #[test]
    fn test_compare_zero_tolerance() {
        let exact = compare_balances(dec!(7), dec!(7.00), dec!(0)).unwrap();
        assert!(!exact.significant);

        let off = compare_balances(dec!(7), dec!(7.001), dec!(0)).unwrap();
        assert!(off.significant);
    }

    #[test]
    fn test_signed_delta() {
        let positive = compare_balances(dec!(100), dec!(95), dec!(1)).unwrap();
        let negative = compare_balances(dec!(95), dec!(100.5), dec!(1)).unwrap();
        let zero = compare_balances(dec!(95), dec!(95), dec!(1)).unwrap();

        assert_eq!(positive.signed_delta(), "+5.00");
        assert_eq!(negative.signed_delta(), "-5.50");
        assert_eq!(zero.signed_delta(), "0.00");
    }

    #[test]
    fn test_compare_rejects_negative_tolerance() {
        let result = compare_balances(dec!(1), dec!(1), dec!(-0.01));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
