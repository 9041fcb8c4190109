use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::InterestType;

/// one period of an amortization schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstallmentLine {
    pub month: u32,
    pub emi: Money,
    pub principal_component: Money,
    pub interest_component: Money,
    pub outstanding_principal: Money,
}

/// full amortization schedule with totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub rows: Vec<InstallmentLine>,
    pub total_payable: Money,
    pub total_interest: Money,
}

impl AmortizationSchedule {
    /// expand a solved loan into its full schedule
    pub fn generate(
        principal: Money,
        annual_rate: Rate,
        emi: Money,
        tenure_months: u32,
        interest_type: InterestType,
    ) -> Self {
        let rows = match interest_type {
            InterestType::Reducing => {
                generate_amortization_schedule(principal, annual_rate, emi, tenure_months)
            }
            InterestType::Fixed => {
                generate_flat_schedule(principal, annual_rate, emi, tenure_months)
            }
        };

        let total_payable = rows
            .iter()
            .map(|r| r.emi)
            .fold(Money::ZERO, |acc, x| acc + x);
        let total_interest = rows
            .iter()
            .map(|r| r.interest_component)
            .fold(Money::ZERO, |acc, x| acc + x);

        Self {
            rows,
            total_payable,
            total_interest,
        }
    }

    /// pretty-printed json view for the presentation layer
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// reducing-balance expansion: interest on the balance at each period start
///
/// pure function of its inputs, safe to memoize
pub fn generate_amortization_schedule(
    principal: Money,
    annual_rate: Rate,
    emi: Money,
    tenure_months: u32,
) -> Vec<InstallmentLine> {
    let monthly_rate = annual_rate.monthly_rate().as_decimal();

    let mut rows = Vec::with_capacity(tenure_months as usize);
    let mut outstanding = principal;

    for month in 1..=tenure_months {
        let interest_component =
            Money::from_decimal(outstanding.as_decimal() * monthly_rate);
        // a ceil'd tenure leaves a short final period; the principal
        // component never exceeds what is still owed
        let principal_component = (emi - interest_component).min(outstanding);
        let ending = (outstanding - principal_component).max(Money::ZERO);

        rows.push(InstallmentLine {
            month,
            emi: principal_component + interest_component,
            principal_component,
            interest_component,
            outstanding_principal: ending,
        });

        outstanding = ending;
    }

    // fold sub-unit rounding residue into the last period
    if let Some(last) = rows.last_mut() {
        if last.outstanding_principal > Money::ZERO
            && last.outstanding_principal < Money::from_major(1)
        {
            last.principal_component += last.outstanding_principal;
            last.emi += last.outstanding_principal;
            last.outstanding_principal = Money::ZERO;
        }
    }

    rows
}

/// flat-interest expansion: constant interest on the original principal
pub fn generate_flat_schedule(
    principal: Money,
    annual_rate: Rate,
    emi: Money,
    tenure_months: u32,
) -> Vec<InstallmentLine> {
    let interest_component = Money::from_decimal(
        principal.as_decimal() * annual_rate.monthly_rate().as_decimal(),
    );

    let mut rows = Vec::with_capacity(tenure_months as usize);
    let mut outstanding = principal;

    for month in 1..=tenure_months {
        let principal_component = if month == tenure_months {
            // last period absorbs the rounding residue
            outstanding
        } else {
            (emi - interest_component).min(outstanding)
        };
        let ending = (outstanding - principal_component).max(Money::ZERO);

        rows.push(InstallmentLine {
            month,
            emi: principal_component + interest_component,
            principal_component,
            interest_component,
            outstanding_principal: ending,
        });

        outstanding = ending;
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(s: &str) -> Money {
        Money::from_str_exact(s).unwrap()
    }

    #[test]
    fn test_schedule_length_and_reconciliation() {
        let principal = Money::from_major(100_000);
        let rate = Rate::from_percentage(dec!(10));
        let emi = crate::solver::calculate_emi(principal, rate, 12);

        let rows = generate_amortization_schedule(principal, rate, emi, 12);
        assert_eq!(rows.len(), 12);

        let principal_sum = rows
            .iter()
            .map(|r| r.principal_component)
            .fold(Money::ZERO, |acc, x| acc + x);
        let tolerance = Money::from_minor(12);
        assert!(
            (principal_sum - principal).abs() <= tolerance,
            "principal components sum to {}",
            principal_sum
        );

        assert_eq!(rows.last().unwrap().outstanding_principal, Money::ZERO);
    }

    #[test]
    fn test_first_period_split() {
        let principal = Money::from_major(100_000);
        let rate = Rate::from_percentage(dec!(10));
        let emi = crate::solver::calculate_emi(principal, rate, 12);

        let rows = generate_amortization_schedule(principal, rate, emi, 12);

        // first month interest: 100000 * 10% / 12
        assert_eq!(rows[0].interest_component, money("833.33"));
        assert_eq!(rows[0].principal_component, money("7958.26"));
    }

    #[test]
    fn test_zero_rate_schedule_has_no_interest() {
        let principal = Money::from_major(12_000);
        let rows =
            generate_amortization_schedule(principal, Rate::ZERO, Money::from_major(1_000), 12);

        assert_eq!(rows.len(), 12);
        for row in &rows {
            assert_eq!(row.interest_component, Money::ZERO);
            assert_eq!(row.principal_component, Money::from_major(1_000));
        }
        assert_eq!(rows.last().unwrap().outstanding_principal, Money::ZERO);
    }

    #[test]
    fn test_outstanding_declines_monotonically() {
        let principal = Money::from_major(250_000);
        let rate = Rate::from_percentage(dec!(8.5));
        let emi = crate::solver::calculate_emi(principal, rate, 60);

        let rows = generate_amortization_schedule(principal, rate, emi, 60);

        let mut previous = principal;
        for row in &rows {
            assert!(row.outstanding_principal < previous);
            previous = row.outstanding_principal;
        }
    }

    #[test]
    fn test_schedule_is_restartable() {
        let principal = Money::from_major(50_000);
        let rate = Rate::from_percentage(dec!(9));
        let emi = crate::solver::calculate_emi(principal, rate, 24);

        let a = generate_amortization_schedule(principal, rate, emi, 24);
        let b = generate_amortization_schedule(principal, rate, emi, 24);
        assert_eq!(a, b);
    }

    #[test]
    fn test_flat_schedule_constant_interest() {
        let principal = Money::from_major(120_000);
        let rate = Rate::from_percentage(dec!(10));
        let emi = crate::solver::calculate_flat_emi(principal, rate, 12);

        let rows = generate_flat_schedule(principal, rate, emi, 12);
        assert_eq!(rows.len(), 12);

        for row in &rows {
            assert_eq!(row.interest_component, Money::from_major(1_000));
        }

        let principal_sum = rows
            .iter()
            .map(|r| r.principal_component)
            .fold(Money::ZERO, |acc, x| acc + x);
        assert_eq!(principal_sum, principal);
        assert_eq!(rows.last().unwrap().outstanding_principal, Money::ZERO);
    }

    #[test]
    fn test_generate_with_totals() {
        let principal = Money::from_major(100_000);
        let rate = Rate::from_percentage(dec!(10));
        let emi = crate::solver::calculate_emi(principal, rate, 12);

        let schedule =
            AmortizationSchedule::generate(principal, rate, emi, 12, InterestType::Reducing);

        assert_eq!(schedule.rows.len(), 12);
        // totals reconcile with the solved summary within rounding
        let expected = crate::solver::calculate_loan_summary(
            principal,
            rate,
            Some(12),
            None,
            InterestType::Reducing,
        )
        .unwrap();
        let drift = (schedule.total_payable - expected.total_payable).abs();
        assert!(drift <= Money::from_minor(12));

        assert!(schedule.to_json_pretty().unwrap().contains("outstanding_principal"));
    }

    #[test]
    fn test_principal_interest_totals_identity() {
        let principal = Money::from_major(100_000);
        let rate = Rate::from_percentage(dec!(10));
        let emi = crate::solver::calculate_emi(principal, rate, 12);

        let schedule =
            AmortizationSchedule::generate(principal, rate, emi, 12, InterestType::Reducing);

        let principal_sum = schedule
            .rows
            .iter()
            .map(|r| r.principal_component)
            .fold(Money::ZERO, |acc, x| acc + x);
        assert_eq!(schedule.total_payable - schedule.total_interest, principal_sum);
    }
}
