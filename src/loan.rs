use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::schedule::InstallmentLine;
use crate::types::{InterestType, LoanId, LoanStatus};

/// loan row owned by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub lender_name: String,
    pub loan_type: String,
    pub principal_amount: Money,
    pub annual_rate: Rate,
    pub tenure_months: u32,
    pub emi_amount: Money,
    pub start_date: NaiveDate,
    pub total_interest: Money,
    pub total_payable: Money,
    pub outstanding_principal: Money,
    pub status: LoanStatus,
    pub interest_type: InterestType,
    /// monotonically increasing write counter, compared-and-swapped on commit
    pub revision: u64,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    /// active loans may complete or close early; terminal states are final
    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        self.status == LoanStatus::Active && next.is_terminal()
    }
}

/// one scheduled installment of a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub loan_id: LoanId,
    pub period: u32,
    pub due_date: NaiveDate,
    pub emi_amount: Money,
    pub principal_component: Money,
    pub interest_component: Money,
    pub outstanding_after: Money,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Installment {
    /// materialize a schedule line as an unpaid row
    pub fn from_line(loan_id: LoanId, start_date: NaiveDate, line: &InstallmentLine) -> Self {
        Self {
            loan_id,
            period: line.month,
            due_date: due_date(start_date, line.month),
            emi_amount: line.emi,
            principal_component: line.principal_component,
            interest_component: line.interest_component,
            outstanding_after: line.outstanding_principal,
            paid: false,
            paid_at: None,
        }
    }
}

/// start date advanced by a number of calendar months
pub fn due_date(start_date: NaiveDate, months: u32) -> NaiveDate {
    start_date
        .checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}
