use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, Utc};

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::loan::{Installment, Loan};
use crate::types::{InterestType, LoanId, LoanStatus};

/// mark one installment paid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaidMark {
    pub period: u32,
    pub paid_at: DateTime<Utc>,
}

/// discard every installment from `from_period` on and insert `rows` instead
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceFuture {
    pub from_period: u32,
    pub rows: Vec<Installment>,
}

/// partial update to the loan row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanFieldsUpdate {
    pub lender_name: Option<String>,
    pub loan_type: Option<String>,
    pub principal_amount: Option<Money>,
    pub annual_rate: Option<Rate>,
    pub tenure_months: Option<u32>,
    pub emi_amount: Option<Money>,
    pub start_date: Option<NaiveDate>,
    pub interest_type: Option<InterestType>,
    pub total_payable: Option<Money>,
    pub total_interest: Option<Money>,
    pub outstanding_principal: Option<Money>,
}

/// one atomic write against a loan: every part commits together or none do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanPatch {
    pub mark_paid: Option<PaidMark>,
    pub replace_future: Option<ReplaceFuture>,
    pub fields: Option<LoanFieldsUpdate>,
    pub status: Option<LoanStatus>,
}

/// persistence contract consumed by the ledger
///
/// `apply` is compare-and-swapped on the loan revision: a write based on a
/// stale read fails with `RevisionConflict` and changes nothing
pub trait LoanStore: Send + Sync {
    /// persist a new loan with its full installment set in one atomic write
    fn insert_loan(&self, loan: Loan, installments: Vec<Installment>) -> Result<()>;

    fn get_loan(&self, loan_id: LoanId) -> Result<Loan>;

    /// all installments, period ascending
    fn list_installments(&self, loan_id: LoanId) -> Result<Vec<Installment>>;

    /// unpaid installments, period ascending
    fn list_unpaid_installments(&self, loan_id: LoanId) -> Result<Vec<Installment>>;

    /// atomically commit a patch; returns the loan row after the write
    fn apply(&self, loan_id: LoanId, expected_revision: u64, patch: LoanPatch) -> Result<Loan>;
}

struct LoanAccount {
    loan: Loan,
    installments: Vec<Installment>,
}

/// in-memory reference store
///
/// each loan lives behind its own mutex, so writes to different loans do not
/// contend
#[derive(Default)]
pub struct MemoryLoanStore {
    accounts: RwLock<HashMap<LoanId, Mutex<LoanAccount>>>,
}

impl MemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoanStore for MemoryLoanStore {
    fn insert_loan(&self, loan: Loan, installments: Vec<Installment>) -> Result<()> {
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        accounts.insert(loan.id, Mutex::new(LoanAccount { loan, installments }));
        Ok(())
    }

    fn get_loan(&self, loan_id: LoanId) -> Result<Loan> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        let account = accounts
            .get(&loan_id)
            .ok_or(LoanError::LoanNotFound { loan_id })?
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(account.loan.clone())
    }

    fn list_installments(&self, loan_id: LoanId) -> Result<Vec<Installment>> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        let account = accounts
            .get(&loan_id)
            .ok_or(LoanError::LoanNotFound { loan_id })?
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(account.installments.clone())
    }

    fn list_unpaid_installments(&self, loan_id: LoanId) -> Result<Vec<Installment>> {
        Ok(self
            .list_installments(loan_id)?
            .into_iter()
            .filter(|i| !i.paid)
            .collect())
    }

    fn apply(&self, loan_id: LoanId, expected_revision: u64, patch: LoanPatch) -> Result<Loan> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        let mut account = accounts
            .get(&loan_id)
            .ok_or(LoanError::LoanNotFound { loan_id })?
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if account.loan.revision != expected_revision {
            return Err(LoanError::RevisionConflict {
                expected: expected_revision,
                found: account.loan.revision,
            });
        }

        // validate before mutating so a failed patch leaves nothing behind
        let paid_index = match &patch.mark_paid {
            Some(mark) => {
                let index = account
                    .installments
                    .iter()
                    .position(|i| i.period == mark.period && !i.paid)
                    .ok_or(LoanError::NoOutstandingInstallment { loan_id })?;
                Some(index)
            }
            None => None,
        };

        if let (Some(index), Some(mark)) = (paid_index, &patch.mark_paid) {
            let row = &mut account.installments[index];
            row.paid = true;
            row.paid_at = Some(mark.paid_at);
        }

        if let Some(replace) = patch.replace_future {
            account
                .installments
                .retain(|i| i.period < replace.from_period);
            account.installments.extend(replace.rows);
            account.installments.sort_by_key(|i| i.period);
        }

        if let Some(fields) = patch.fields {
            let loan = &mut account.loan;
            if let Some(v) = fields.lender_name {
                loan.lender_name = v;
            }
            if let Some(v) = fields.loan_type {
                loan.loan_type = v;
            }
            if let Some(v) = fields.principal_amount {
                loan.principal_amount = v;
            }
            if let Some(v) = fields.annual_rate {
                loan.annual_rate = v;
            }
            if let Some(v) = fields.tenure_months {
                loan.tenure_months = v;
            }
            if let Some(v) = fields.emi_amount {
                loan.emi_amount = v;
            }
            if let Some(v) = fields.start_date {
                loan.start_date = v;
            }
            if let Some(v) = fields.interest_type {
                loan.interest_type = v;
            }
            if let Some(v) = fields.total_payable {
                loan.total_payable = v;
            }
            if let Some(v) = fields.total_interest {
                loan.total_interest = v;
            }
            if let Some(v) = fields.outstanding_principal {
                loan.outstanding_principal = v;
            }
        }

        if let Some(status) = patch.status {
            account.loan.status = status;
        }

        account.loan.revision += 1;
        Ok(account.loan.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::generate_amortization_schedule;
    use crate::solver::calculate_emi;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn seed(store: &MemoryLoanStore) -> LoanId {
        let principal = Money::from_major(100_000);
        let rate = Rate::from_percentage(dec!(10));
        let emi = calculate_emi(principal, rate, 12);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let loan = Loan {
            id: uuid::Uuid::new_v4(),
            lender_name: "HBL".to_string(),
            loan_type: "personal".to_string(),
            principal_amount: principal,
            annual_rate: rate,
            tenure_months: 12,
            emi_amount: emi,
            start_date: start,
            total_interest: Money::from_str_exact("5499.08").unwrap(),
            total_payable: Money::from_str_exact("105499.08").unwrap(),
            outstanding_principal: principal,
            status: LoanStatus::Active,
            interest_type: InterestType::Reducing,
            revision: 0,
        };
        let id = loan.id;

        let installments = generate_amortization_schedule(principal, rate, emi, 12)
            .iter()
            .map(|line| Installment::from_line(id, start, line))
            .collect();

        store.insert_loan(loan, installments).unwrap();
        id
    }

    #[test]
    fn test_insert_and_read_back() {
        let store = MemoryLoanStore::new();
        let id = seed(&store);

        let loan = store.get_loan(id).unwrap();
        assert_eq!(loan.revision, 0);

        let rows = store.list_installments(id).unwrap();
        assert_eq!(rows.len(), 12);
        assert!(rows.windows(2).all(|w| w[0].period < w[1].period));
        assert_eq!(store.list_unpaid_installments(id).unwrap().len(), 12);
    }

    #[test]
    fn test_unknown_loan() {
        let store = MemoryLoanStore::new();
        let err = store.get_loan(uuid::Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, LoanError::LoanNotFound { .. }));
    }

    #[test]
    fn test_mark_paid_bumps_revision() {
        let store = MemoryLoanStore::new();
        let id = seed(&store);
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let loan = store
            .apply(
                id,
                0,
                LoanPatch {
                    mark_paid: Some(PaidMark { period: 1, paid_at: now }),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(loan.revision, 1);
        let unpaid = store.list_unpaid_installments(id).unwrap();
        assert_eq!(unpaid.len(), 11);
        assert_eq!(unpaid[0].period, 2);

        let rows = store.list_installments(id).unwrap();
        assert!(rows[0].paid);
        assert_eq!(rows[0].paid_at, Some(now));
    }

    #[test]
    fn test_stale_revision_rejected() {
        let store = MemoryLoanStore::new();
        let id = seed(&store);
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let mark = LoanPatch {
            mark_paid: Some(PaidMark { period: 1, paid_at: now }),
            ..Default::default()
        };
        store.apply(id, 0, mark.clone()).unwrap();

        let err = store.apply(id, 0, mark).unwrap_err();
        assert!(matches!(err, LoanError::RevisionConflict { expected: 0, found: 1 }));
    }

    #[test]
    fn test_failed_patch_leaves_state_unchanged() {
        let store = MemoryLoanStore::new();
        let id = seed(&store);
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        // period 99 does not exist; the status part must not land either
        let err = store
            .apply(
                id,
                0,
                LoanPatch {
                    mark_paid: Some(PaidMark { period: 99, paid_at: now }),
                    status: Some(LoanStatus::Completed),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LoanError::NoOutstandingInstallment { .. }));

        let loan = store.get_loan(id).unwrap();
        assert_eq!(loan.revision, 0);
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(store.list_unpaid_installments(id).unwrap().len(), 12);
    }

    #[test]
    fn test_replace_future_installments() {
        let store = MemoryLoanStore::new();
        let id = seed(&store);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let principal = Money::from_major(50_000);
        let rate = Rate::from_percentage(dec!(10));
        let emi = calculate_emi(principal, rate, 6);
        let rows: Vec<Installment> = generate_amortization_schedule(principal, rate, emi, 6)
            .iter()
            .map(|line| {
                let mut row = Installment::from_line(id, start, line);
                row.period += 6;
                row
            })
            .collect();

        store
            .apply(
                id,
                0,
                LoanPatch {
                    replace_future: Some(ReplaceFuture { from_period: 7, rows }),
                    fields: Some(LoanFieldsUpdate {
                        emi_amount: Some(emi),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap();

        let rows = store.list_installments(id).unwrap();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[6].emi_amount, emi);
        assert_eq!(store.get_loan(id).unwrap().emi_amount, emi);
    }
}
