use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::solver;
use crate::types::{InterestType, PrepaymentStrategy};

/// inputs for a lump-sum prepayment recomputation
///
/// the caller supplies the interest baseline; `total_interest_saved` is
/// measured against it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrepaymentRequest {
    pub outstanding_principal: Money,
    pub annual_rate: Rate,
    pub current_emi: Money,
    pub remaining_tenure: u32,
    pub prepayment_amount: Money,
    pub strategy: PrepaymentStrategy,
    pub original_total_interest: Money,
    pub interest_type: InterestType,
}

/// recomputed terms after a prepayment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrepaymentOutcome {
    pub strategy: PrepaymentStrategy,
    pub new_principal: Money,
    pub new_emi: Money,
    pub new_tenure_months: u32,
    pub total_interest_saved: Money,
}

impl PrepaymentOutcome {
    /// the prepayment cleared the whole balance
    pub fn fully_retired(&self) -> bool {
        self.new_principal.is_zero() && self.new_tenure_months == 0
    }
}

/// recompute the EMI for a reduced principal, holding the tenure fixed
pub fn recalc_emi_after_prepayment(
    reduced_principal: Money,
    annual_rate: Rate,
    remaining_tenure: u32,
) -> Money {
    solver::calculate_emi(reduced_principal, annual_rate, remaining_tenure)
}

/// recompute the tenure for a reduced principal, holding the EMI fixed
pub fn recalc_tenure_after_prepayment(
    reduced_principal: Money,
    annual_rate: Rate,
    current_emi: Money,
) -> Result<u32> {
    solver::calculate_tenure_months(reduced_principal, annual_rate, current_emi)
}

/// apply a lump-sum prepayment and recompute the remaining terms
///
/// pure arithmetic; the ledger persists the resulting schedule
pub fn apply_prepayment(request: PrepaymentRequest) -> Result<PrepaymentOutcome> {
    let new_principal = request.outstanding_principal - request.prepayment_amount;

    // fully retired: all future interest is avoided
    if new_principal <= Money::ZERO {
        return Ok(PrepaymentOutcome {
            strategy: request.strategy,
            new_principal: Money::ZERO,
            new_emi: Money::ZERO,
            new_tenure_months: 0,
            total_interest_saved: request.original_total_interest,
        });
    }

    let (new_emi, new_tenure_months) = match request.strategy {
        PrepaymentStrategy::ReduceEmi => {
            let emi = match request.interest_type {
                InterestType::Reducing => recalc_emi_after_prepayment(
                    new_principal,
                    request.annual_rate,
                    request.remaining_tenure,
                ),
                InterestType::Fixed => solver::calculate_flat_emi(
                    new_principal,
                    request.annual_rate,
                    request.remaining_tenure,
                ),
            };
            (emi, request.remaining_tenure)
        }
        PrepaymentStrategy::ReduceTenure => {
            let tenure = match request.interest_type {
                InterestType::Reducing => recalc_tenure_after_prepayment(
                    new_principal,
                    request.annual_rate,
                    request.current_emi,
                )?,
                InterestType::Fixed => solver::calculate_flat_tenure_months(
                    new_principal,
                    request.annual_rate,
                    request.current_emi,
                )?,
            };
            (request.current_emi, tenure)
        }
    };

    let residual_interest = new_emi * Decimal::from(new_tenure_months) - new_principal;
    let total_interest_saved = request.original_total_interest - residual_interest;

    Ok(PrepaymentOutcome {
        strategy: request.strategy,
        new_principal,
        new_emi,
        new_tenure_months,
        total_interest_saved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(strategy: PrepaymentStrategy, prepayment: Money) -> PrepaymentRequest {
        PrepaymentRequest {
            outstanding_principal: Money::from_major(100_000),
            annual_rate: Rate::from_percentage(dec!(10)),
            current_emi: solver::calculate_emi(
                Money::from_major(100_000),
                Rate::from_percentage(dec!(10)),
                12,
            ),
            remaining_tenure: 12,
            prepayment_amount: prepayment,
            strategy,
            original_total_interest: Money::from_str_exact("5499.08").unwrap(),
            interest_type: InterestType::Reducing,
        }
    }

    #[test]
    fn test_full_prepayment_retires_loan() {
        for amount in [Money::from_major(100_000), Money::from_major(150_000)] {
            let outcome =
                apply_prepayment(request(PrepaymentStrategy::ReduceTenure, amount)).unwrap();

            assert!(outcome.fully_retired());
            assert_eq!(outcome.new_emi, Money::ZERO);
            assert_eq!(outcome.new_tenure_months, 0);
            assert_eq!(
                outcome.total_interest_saved,
                Money::from_str_exact("5499.08").unwrap()
            );
        }
    }

    #[test]
    fn test_reduce_emi_holds_tenure() {
        let outcome =
            apply_prepayment(request(PrepaymentStrategy::ReduceEmi, Money::from_major(20_000)))
                .unwrap();

        assert_eq!(outcome.new_tenure_months, 12);
        assert_eq!(outcome.new_principal, Money::from_major(80_000));

        // EMI drops in proportion to the principal
        let expected = solver::calculate_emi(
            Money::from_major(80_000),
            Rate::from_percentage(dec!(10)),
            12,
        );
        assert_eq!(outcome.new_emi, expected);
        assert!(outcome.new_emi < Money::from_str_exact("8791.59").unwrap());
        assert!(outcome.total_interest_saved.is_positive());
    }

    #[test]
    fn test_reduce_tenure_holds_emi() {
        let current_emi = solver::calculate_emi(
            Money::from_major(100_000),
            Rate::from_percentage(dec!(10)),
            12,
        );
        let outcome =
            apply_prepayment(request(PrepaymentStrategy::ReduceTenure, Money::from_major(20_000)))
                .unwrap();

        assert_eq!(outcome.new_emi, current_emi);
        assert!(outcome.new_tenure_months < 12);
        assert_eq!(outcome.new_principal, Money::from_major(80_000));
    }

    #[test]
    fn test_interest_saved_follows_baseline() {
        let outcome =
            apply_prepayment(request(PrepaymentStrategy::ReduceEmi, Money::from_major(20_000)))
                .unwrap();

        let residual = outcome.new_emi * Decimal::from(12) - Money::from_major(80_000);
        let expected = Money::from_str_exact("5499.08").unwrap() - residual;
        assert_eq!(outcome.total_interest_saved, expected);
    }

    #[test]
    fn test_flat_loan_prepayment() {
        let request = PrepaymentRequest {
            outstanding_principal: Money::from_major(120_000),
            annual_rate: Rate::from_percentage(dec!(10)),
            current_emi: Money::from_major(11_000),
            remaining_tenure: 12,
            prepayment_amount: Money::from_major(60_000),
            strategy: PrepaymentStrategy::ReduceTenure,
            original_total_interest: Money::from_major(12_000),
            interest_type: InterestType::Fixed,
        };

        let outcome = apply_prepayment(request).unwrap();
        assert_eq!(outcome.new_emi, Money::from_major(11_000));
        // 60000 / (11000 - 500) rounds up to 6 months
        assert_eq!(outcome.new_tenure_months, 6);
    }
}
