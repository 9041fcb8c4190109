pub mod closure;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod loan;
pub mod prepayment;
pub mod schedule;
pub mod solver;
pub mod store;
pub mod types;

// re-export key types
pub use closure::{calculate_early_closure, ClosureQuote};
pub use config::{LoanApplication, LoanApplicationBuilder, LoanTermsUpdate};
pub use decimal::{Money, Rate};
pub use errors::{LoanError, Result};
pub use events::{Event, EventStore};
pub use ledger::{ClosureReceipt, CreatedLoan, LoanLedger, PaymentReceipt, TermsReceipt};
pub use loan::{Installment, Loan};
pub use prepayment::{
    apply_prepayment, recalc_emi_after_prepayment, recalc_tenure_after_prepayment,
    PrepaymentOutcome, PrepaymentRequest,
};
pub use schedule::{
    generate_amortization_schedule, generate_flat_schedule, AmortizationSchedule, InstallmentLine,
};
pub use solver::{
    calculate_emi, calculate_flat_emi, calculate_flat_tenure_months, calculate_loan_summary,
    calculate_tenure_months, LoanSummary,
};
pub use store::{
    LoanFieldsUpdate, LoanPatch, LoanStore, MemoryLoanStore, PaidMark, ReplaceFuture,
};
pub use types::{InterestType, LoanId, LoanStatus, PrepaymentStrategy};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
