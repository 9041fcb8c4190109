use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// loan has unpaid installments
    Active,
    /// last installment paid on schedule
    Completed,
    /// foreclosed before the end of tenure
    ClosedEarly,
}

impl LoanStatus {
    /// terminal states admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Completed | LoanStatus::ClosedEarly)
    }
}

/// interest computation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterestType {
    /// interest on the outstanding balance at each period start
    Reducing,
    /// flat interest on the original principal every period
    Fixed,
}

/// how a lump-sum prepayment reshapes the remaining schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrepaymentStrategy {
    /// lower the monthly burden, keep the end date
    ReduceEmi,
    /// keep the monthly burden, finish earlier
    ReduceTenure,
}
