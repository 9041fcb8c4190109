use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::types::InterestType;

/// resolved loan terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanSummary {
    pub emi: Money,
    pub tenure_months: u32,
    pub total_payable: Money,
    pub total_interest: Money,
}

/// calculate EMI under reducing-balance amortization
///
/// EMI = P * r * (1 + r)^n / ((1 + r)^n - 1), straight-line when r = 0
pub fn calculate_emi(principal: Money, annual_rate: Rate, tenure_months: u32) -> Money {
    if tenure_months == 0 {
        return principal;
    }

    let monthly_rate = annual_rate.monthly_rate().as_decimal();

    if monthly_rate.is_zero() {
        return principal / Decimal::from(tenure_months);
    }

    let compound = compound_factor(monthly_rate, tenure_months);
    let numerator = principal.as_decimal() * monthly_rate * compound;
    let denominator = compound - Decimal::ONE;

    Money::from_decimal(numerator / denominator)
}

/// calculate tenure for a given EMI under reducing-balance amortization
///
/// n = ln(emi / (emi - P*r)) / ln(1 + r), rounded up to the next whole month
pub fn calculate_tenure_months(principal: Money, annual_rate: Rate, emi: Money) -> Result<u32> {
    if !emi.is_positive() {
        return Err(LoanError::InvalidLoanTerms {
            message: format!("emi must be positive, got {}", emi),
        });
    }

    let monthly_rate = annual_rate.monthly_rate().as_decimal();
    let p = principal.as_decimal();
    let e = emi.as_decimal();

    if monthly_rate.is_zero() {
        return months_from_ratio(p / e);
    }

    let first_period_interest = p * monthly_rate;
    if e <= first_period_interest {
        return Err(LoanError::UnpayableEmi {
            emi,
            first_period_interest: Money::from_decimal(first_period_interest),
        });
    }

    let ratio = e / (e - first_period_interest);
    let numerator = ratio.checked_ln().ok_or_else(non_finite_tenure)?;
    let denominator = (Decimal::ONE + monthly_rate)
        .checked_ln()
        .ok_or_else(non_finite_tenure)?;

    months_from_ratio(numerator / denominator)
}

/// calculate EMI under flat interest: every period pays P/n plus interest on
/// the original principal
pub fn calculate_flat_emi(principal: Money, annual_rate: Rate, tenure_months: u32) -> Money {
    if tenure_months == 0 {
        return principal;
    }

    let monthly_interest = Money::from_decimal(
        principal.as_decimal() * annual_rate.monthly_rate().as_decimal(),
    );
    principal / Decimal::from(tenure_months) + monthly_interest
}

/// calculate tenure for a given EMI under flat interest
///
/// from emi*n = P + P*r*n follows n = P / (emi - P*r), rounded up
pub fn calculate_flat_tenure_months(
    principal: Money,
    annual_rate: Rate,
    emi: Money,
) -> Result<u32> {
    if !emi.is_positive() {
        return Err(LoanError::InvalidLoanTerms {
            message: format!("emi must be positive, got {}", emi),
        });
    }

    let monthly_rate = annual_rate.monthly_rate().as_decimal();
    let p = principal.as_decimal();
    let e = emi.as_decimal();

    let first_period_interest = p * monthly_rate;
    if e <= first_period_interest {
        return Err(LoanError::UnpayableEmi {
            emi,
            first_period_interest: Money::from_decimal(first_period_interest),
        });
    }

    months_from_ratio(p / (e - first_period_interest))
}

/// resolve the full loan summary from principal, rate, and exactly one of
/// tenure or EMI
pub fn calculate_loan_summary(
    principal: Money,
    annual_rate: Rate,
    tenure_months: Option<u32>,
    emi: Option<Money>,
    interest_type: InterestType,
) -> Result<LoanSummary> {
    if !principal.is_positive() {
        return Err(LoanError::InvalidLoanTerms {
            message: format!("principal must be positive, got {}", principal),
        });
    }
    if annual_rate.is_negative() {
        return Err(LoanError::InvalidLoanTerms {
            message: format!("annual rate must not be negative, got {}", annual_rate),
        });
    }

    let (emi, tenure_months) = match (tenure_months, emi) {
        (Some(n), None) => {
            if n == 0 {
                return Err(LoanError::InvalidLoanTerms {
                    message: "tenure must be at least one month".to_string(),
                });
            }
            let emi = match interest_type {
                InterestType::Reducing => calculate_emi(principal, annual_rate, n),
                InterestType::Fixed => calculate_flat_emi(principal, annual_rate, n),
            };
            (emi, n)
        }
        (None, Some(e)) => {
            if !e.is_positive() {
                return Err(LoanError::InvalidLoanTerms {
                    message: format!("emi must be positive, got {}", e),
                });
            }
            let n = match interest_type {
                InterestType::Reducing => calculate_tenure_months(principal, annual_rate, e)?,
                InterestType::Fixed => calculate_flat_tenure_months(principal, annual_rate, e)?,
            };
            (e, n)
        }
        _ => return Err(LoanError::MissingLoanTerms),
    };

    let total_payable = emi * Decimal::from(tenure_months);
    let total_interest = total_payable - principal;

    Ok(LoanSummary {
        emi,
        tenure_months,
        total_payable,
        total_interest,
    })
}

/// (1 + r)^n by repeated multiplication
fn compound_factor(monthly_rate: Decimal, months: u32) -> Decimal {
    let base = Decimal::ONE + monthly_rate;
    let mut compound = Decimal::ONE;
    for _ in 0..months {
        compound *= base;
    }
    compound
}

fn months_from_ratio(months: Decimal) -> Result<u32> {
    months
        .ceil()
        .to_u32()
        .ok_or_else(non_finite_tenure)
}

fn non_finite_tenure() -> LoanError {
    LoanError::InvalidLoanTerms {
        message: "tenure is not representable for the given terms".to_string(),
    }
}
