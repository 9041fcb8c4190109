use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;

/// lump sum required to foreclose a loan today
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosureQuote {
    pub closure_amount: Money,
    pub interest_saved: Money,
}

/// quote an early closure: outstanding principal plus the flat foreclosure
/// fee; the remaining scheduled interest is what the borrower avoids
///
/// pure and idempotent
pub fn calculate_early_closure(
    outstanding_principal: Money,
    remaining_interest: Money,
    foreclosure_fee_percent: Decimal,
) -> ClosureQuote {
    let fee = outstanding_principal.percentage(foreclosure_fee_percent);

    ClosureQuote {
        closure_amount: outstanding_principal + fee,
        interest_saved: remaining_interest,
    }
}
