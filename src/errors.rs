use thiserror::Error;

use crate::decimal::Money;
use crate::types::{LoanId, LoanStatus};

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("emi {emi} does not cover first-period interest {first_period_interest}")]
    UnpayableEmi {
        emi: Money,
        first_period_interest: Money,
    },

    #[error("exactly one of tenure and emi must be supplied")]
    MissingLoanTerms,

    #[error("loan {loan_id} has recorded payments; financial terms are locked")]
    LoanLocked {
        loan_id: LoanId,
    },

    #[error("loan {loan_id} has no outstanding installment")]
    NoOutstandingInstallment {
        loan_id: LoanId,
    },

    #[error("loan not found: {loan_id}")]
    LoanNotFound {
        loan_id: LoanId,
    },

    #[error("loan not active: current status is {status:?}")]
    LoanNotActive {
        status: LoanStatus,
    },

    #[error("invalid loan terms: {message}")]
    InvalidLoanTerms {
        message: String,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("stale loan revision: expected {expected}, found {found}")]
    RevisionConflict {
        expected: u64,
        found: u64,
    },
}

pub type Result<T> = std::result::Result<T, LoanError>;
