use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PosError;
use crate::types::{MAX_CLP_AMOUNT, PaymentMethod, SaleStatus, round_clp};

/// A tender handed over at the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub amount: Decimal,
}

/// Outcome of applying payments to an amount due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Sum of the tenders received.
    pub tendered: Decimal,
    /// Portion of the tenders applied to the sale.
    pub applied: Decimal,
    /// Cash handed back to the customer.
    pub change: Decimal,
    /// Still owed after this settlement.
    pub balance: Decimal,
    pub status: SaleStatus,
}

/// Apply `payments` to `due`.
///
/// Cash may exceed what is owed; the excess is returned as change. Card and
/// transfer tenders are charged exactly, so together they may never exceed
/// `due`. Paying less than `due` is allowed and leaves the sale
/// [`SaleStatus::PartiallyPaid`] with a balance.
///
/// ```
/// use optica_core::PaymentMethod;
/// use optica_core::pos::{Payment, settle};
/// use rust_decimal::Decimal;
///
/// let s = settle(
///     Decimal::from(18_500),
///     &[Payment { method: PaymentMethod::Cash, amount: Decimal::from(20_000) }],
/// )
/// .unwrap();
/// assert_eq!(s.change, Decimal::from(1_500));
/// assert_eq!(s.balance, Decimal::ZERO);
/// ```
///
/// # Errors
///
/// Returns an error if a payment is not a positive whole amount no larger
/// than [`MAX_CLP_AMOUNT`], if no payment is given for a positive amount
/// due, or if non-cash tenders exceed the amount due.
pub fn settle(due: Decimal, payments: &[Payment]) -> Result<Settlement, PosError> {
    if payments
        .iter()
        .any(|p| {
            p.amount <= Decimal::ZERO || p.amount > MAX_CLP_AMOUNT || round_clp(p.amount) != p.amount
        })
    {
        return Err(PosError::InvalidPayment);
    }

    let due = due.max(Decimal::ZERO);
    let tendered = sum(payments.iter())?;

    if due > Decimal::ZERO && tendered.is_zero() {
        return Err(PosError::NoPayment);
    }

    let non_cash = sum(payments.iter().filter(|p| p.method != PaymentMethod::Cash))?;
    if non_cash > due {
        return Err(PosError::NonCashOverpayment { due });
    }

    let change = (tendered - due).max(Decimal::ZERO);
    let applied = tendered - change;
    let balance = due - applied;

    Ok(Settlement {
        tendered,
        applied,
        change,
        balance,
        status: if balance.is_zero() {
            SaleStatus::Paid
        } else {
            SaleStatus::PartiallyPaid
        },
    })
}

fn sum<'a>(mut payments: impl Iterator<Item = &'a Payment>) -> Result<Decimal, PosError> {
    payments.try_fold(Decimal::ZERO, |acc, p| {
        acc.checked_add(p.amount).ok_or(PosError::InvalidPayment)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const fn pay(method: PaymentMethod, amount: Decimal) -> Payment {
        Payment { method, amount }
    }

    #[test]
    fn test_exact_card_payment() {
        let s = settle(dec!(59990), &[pay(PaymentMethod::Debit, dec!(59990))]).unwrap();
        assert_eq!(s.status, SaleStatus::Paid);
        assert_eq!(s.change, dec!(0));
        assert_eq!(s.applied, dec!(59990));
    }

    #[test]
    fn test_split_payment_with_cash_change() {
        let s = settle(
            dec!(100000),
            &[
                pay(PaymentMethod::Credit, dec!(70000)),
                pay(PaymentMethod::Cash, dec!(40000)),
            ],
        )
        .unwrap();
        assert_eq!(s.tendered, dec!(110000));
        assert_eq!(s.change, dec!(10000));
        assert_eq!(s.balance, dec!(0));
        assert_eq!(s.status, SaleStatus::Paid);
    }

    #[test]
    fn test_deposit_leaves_balance() {
        let s = settle(dec!(150000), &[pay(PaymentMethod::Transfer, dec!(50000))]).unwrap();
        assert_eq!(s.status, SaleStatus::PartiallyPaid);
        assert_eq!(s.balance, dec!(100000));
    }

    #[test]
    fn test_non_cash_overpayment_rejected() {
        assert_eq!(
            settle(dec!(1000), &[pay(PaymentMethod::Debit, dec!(1500))]),
            Err(PosError::NonCashOverpayment { due: dec!(1000) })
        );
    }

    #[test]
    fn test_no_payment_rejected() {
        assert_eq!(settle(dec!(1000), &[]), Err(PosError::NoPayment));
    }

    #[test]
    fn test_invalid_amounts_rejected() {
        assert_eq!(
            settle(dec!(1000), &[pay(PaymentMethod::Cash, dec!(0))]),
            Err(PosError::InvalidPayment)
        );
        assert_eq!(
            settle(dec!(1000), &[pay(PaymentMethod::Cash, dec!(10.5))]),
            Err(PosError::InvalidPayment)
        );
    }

    #[test]
    fn test_oversized_tenders_rejected() {
        let huge = Decimal::MAX;
        assert_eq!(
            settle(
                dec!(1000),
                &[pay(PaymentMethod::Cash, huge), pay(PaymentMethod::Cash, huge)]
            ),
            Err(PosError::InvalidPayment)
        );
        assert_eq!(
            settle(dec!(1000), &[pay(PaymentMethod::Cash, MAX_CLP_AMOUNT + dec!(1))]),
            Err(PosError::InvalidPayment)
        );

        let s = settle(dec!(1000), &[pay(PaymentMethod::Cash, MAX_CLP_AMOUNT)]).unwrap();
        assert_eq!(s.change, MAX_CLP_AMOUNT - dec!(1000));
    }

    #[test]
    fn test_free_sale_needs_no_payment() {
        let s = settle(dec!(0), &[]).unwrap();
        assert_eq!(s.status, SaleStatus::Paid);
    }
}
