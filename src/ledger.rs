use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use hourglass_rs::SafeTimeProvider;
use log::info;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::closure::{calculate_early_closure, ClosureQuote};
use crate::config::{LoanApplication, LoanTermsUpdate};
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::loan::{due_date, Installment, Loan};
use crate::prepayment::{apply_prepayment, PrepaymentOutcome, PrepaymentRequest};
use crate::schedule::AmortizationSchedule;
use crate::solver::calculate_loan_summary;
use crate::store::{LoanFieldsUpdate, LoanPatch, LoanStore, PaidMark, ReplaceFuture};
use crate::types::{LoanId, LoanStatus, PrepaymentStrategy};

/// result of creating a loan
#[derive(Debug)]
pub struct CreatedLoan {
    pub loan: Loan,
    pub events: Vec<Event>,
}

/// result of recording a payment
#[derive(Debug)]
pub struct PaymentReceipt {
    pub loan: Loan,
    pub period: u32,
    pub amount: Money,
    pub prepayment: Option<PrepaymentOutcome>,
    pub events: Vec<Event>,
}

/// result of updating loan terms
#[derive(Debug)]
pub struct TermsReceipt {
    pub loan: Loan,
    pub events: Vec<Event>,
}

/// result of an early closure
#[derive(Debug)]
pub struct ClosureReceipt {
    pub loan: Loan,
    pub quote: ClosureQuote,
    pub events: Vec<Event>,
}

/// stateful orchestrator over a loan store
///
/// every mutating operation is serialized per loan id: a per-loan gate is
/// held across the read-compute-commit span, and the store's revision check
/// rejects any write based on a stale read. operations on different loans
/// proceed in parallel.
pub struct LoanLedger<S: LoanStore> {
    store: S,
    gates: Mutex<HashMap<LoanId, Arc<Mutex<()>>>>,
}

impl<S: LoanStore> LoanLedger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn gate(&self, loan_id: LoanId) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates
            .entry(loan_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// create a loan and materialize its full installment set in one atomic
    /// write
    pub fn create_loan(
        &self,
        application: LoanApplication,
        time: &SafeTimeProvider,
    ) -> Result<CreatedLoan> {
        application.validate()?;

        let summary = calculate_loan_summary(
            application.principal,
            application.annual_rate,
            application.tenure_months,
            application.emi,
            application.interest_type,
        )?;

        let schedule = AmortizationSchedule::generate(
            application.principal,
            application.annual_rate,
            summary.emi,
            summary.tenure_months,
            application.interest_type,
        );

        let loan = Loan {
            id: Uuid::new_v4(),
            lender_name: application.lender_name,
            loan_type: application.loan_type,
            principal_amount: application.principal,
            annual_rate: application.annual_rate,
            tenure_months: summary.tenure_months,
            emi_amount: summary.emi,
            start_date: application.start_date,
            total_interest: summary.total_interest,
            total_payable: summary.total_payable,
            outstanding_principal: application.principal,
            status: LoanStatus::Active,
            interest_type: application.interest_type,
            revision: 0,
        };

        let installments: Vec<Installment> = schedule
            .rows
            .iter()
            .map(|line| Installment::from_line(loan.id, loan.start_date, line))
            .collect();

        self.store.insert_loan(loan.clone(), installments)?;

        let mut events = EventStore::new();
        events.emit(Event::LoanCreated {
            loan_id: loan.id,
            principal: loan.principal_amount,
            emi: loan.emi_amount,
            tenure_months: loan.tenure_months,
            timestamp: time.now(),
        });

        info!(
            "created loan {}: {} over {} months at {}",
            loan.id, loan.principal_amount, loan.tenure_months, loan.annual_rate
        );

        Ok(CreatedLoan {
            loan,
            events: events.take_events(),
        })
    }

    /// record a payment against the earliest unpaid installment
    ///
    /// any amount at or below that installment's EMI settles it in full;
    /// the excess above the EMI is applied as a prepayment under the given
    /// strategy and the future schedule is rewritten atomically
    pub fn record_payment(
        &self,
        loan_id: LoanId,
        amount: Money,
        strategy: PrepaymentStrategy,
        time: &SafeTimeProvider,
    ) -> Result<PaymentReceipt> {
        if !amount.is_positive() {
            return Err(LoanError::InvalidPaymentAmount { amount });
        }

        let gate = self.gate(loan_id);
        let _serial = gate.lock().unwrap_or_else(PoisonError::into_inner);

        let loan = self.store.get_loan(loan_id)?;
        if !loan.is_active() {
            return Err(LoanError::NoOutstandingInstallment { loan_id });
        }

        let unpaid = self.store.list_unpaid_installments(loan_id)?;
        let current = match unpaid.first() {
            Some(row) => row.clone(),
            None => return Err(LoanError::NoOutstandingInstallment { loan_id }),
        };
        let remaining = &unpaid[1..];

        let now = time.now();
        let mut events = EventStore::new();
        events.emit(Event::PaymentRecorded {
            loan_id,
            period: current.period,
            amount,
            timestamp: now,
        });

        let outstanding_after =
            (loan.outstanding_principal - current.principal_component).max(Money::ZERO);

        let mut patch = LoanPatch {
            mark_paid: Some(PaidMark {
                period: current.period,
                paid_at: now,
            }),
            ..Default::default()
        };

        let mut prepayment = None;

        if amount <= current.emi_amount {
            // settles the installment in full, even below the EMI
            if remaining.is_empty() {
                patch.fields = Some(LoanFieldsUpdate {
                    outstanding_principal: Some(Money::ZERO),
                    ..Default::default()
                });
                patch.status = Some(LoanStatus::Completed);
                events.emit(Event::StatusChanged {
                    loan_id,
                    old_status: LoanStatus::Active,
                    new_status: LoanStatus::Completed,
                    timestamp: now,
                });
            } else {
                patch.fields = Some(LoanFieldsUpdate {
                    outstanding_principal: Some(outstanding_after),
                    ..Default::default()
                });
            }
        } else {
            let excess = amount - current.emi_amount;
            let future_interest = remaining
                .iter()
                .map(|i| i.interest_component)
                .fold(Money::ZERO, |acc, x| acc + x);
            let future_payable = remaining
                .iter()
                .map(|i| i.emi_amount)
                .fold(Money::ZERO, |acc, x| acc + x);

            let outcome = apply_prepayment(PrepaymentRequest {
                outstanding_principal: outstanding_after,
                annual_rate: loan.annual_rate,
                current_emi: loan.emi_amount,
                remaining_tenure: remaining.len() as u32,
                prepayment_amount: excess,
                strategy,
                original_total_interest: future_interest,
                interest_type: loan.interest_type,
            })?;

            events.emit(Event::PrepaymentApplied {
                loan_id,
                amount: excess,
                strategy,
                new_emi: outcome.new_emi,
                new_tenure_months: outcome.new_tenure_months,
                interest_saved: outcome.total_interest_saved,
                timestamp: now,
            });

            let from_period = current.period + 1;
            let applied = excess.min(outstanding_after);

            if outcome.fully_retired() {
                let total_payable = loan.total_payable - future_payable + applied;
                patch.replace_future = Some(ReplaceFuture {
                    from_period,
                    rows: Vec::new(),
                });
                patch.fields = Some(LoanFieldsUpdate {
                    outstanding_principal: Some(Money::ZERO),
                    tenure_months: Some(current.period),
                    total_payable: Some(total_payable),
                    total_interest: Some(total_payable - loan.principal_amount),
                    ..Default::default()
                });
                patch.status = Some(LoanStatus::Completed);
                events.emit(Event::StatusChanged {
                    loan_id,
                    old_status: LoanStatus::Active,
                    new_status: LoanStatus::Completed,
                    timestamp: now,
                });
            } else {
                let regenerated = AmortizationSchedule::generate(
                    outcome.new_principal,
                    loan.annual_rate,
                    outcome.new_emi,
                    outcome.new_tenure_months,
                    loan.interest_type,
                );
                let rows: Vec<Installment> = regenerated
                    .rows
                    .iter()
                    .map(|line| {
                        let mut row = Installment::from_line(loan_id, loan.start_date, line);
                        row.period = current.period + line.month;
                        row.due_date = due_date(loan.start_date, row.period);
                        row
                    })
                    .collect();

                let total_payable =
                    loan.total_payable - future_payable + regenerated.total_payable + applied;
                patch.replace_future = Some(ReplaceFuture { from_period, rows });
                patch.fields = Some(LoanFieldsUpdate {
                    emi_amount: Some(outcome.new_emi),
                    tenure_months: Some(current.period + outcome.new_tenure_months),
                    outstanding_principal: Some(outcome.new_principal),
                    total_payable: Some(total_payable),
                    total_interest: Some(total_payable - loan.principal_amount),
                    ..Default::default()
                });
                events.emit(Event::ScheduleRegenerated {
                    loan_id,
                    from_period,
                    periods: outcome.new_tenure_months,
                    timestamp: now,
                });
            }

            prepayment = Some(outcome);
        }

        let loan = self.store.apply(loan_id, loan.revision, patch)?;

        info!(
            "recorded payment of {} against loan {} period {}",
            amount, loan_id, current.period
        );

        Ok(PaymentReceipt {
            loan,
            period: current.period,
            amount,
            prepayment,
            events: events.take_events(),
        })
    }

    /// update loan terms
    ///
    /// financial fields are locked once any installment is paid; a permitted
    /// financial edit re-resolves the summary and regenerates the whole
    /// schedule
    pub fn update_terms(
        &self,
        loan_id: LoanId,
        update: LoanTermsUpdate,
        time: &SafeTimeProvider,
    ) -> Result<TermsReceipt> {
        let gate = self.gate(loan_id);
        let _serial = gate.lock().unwrap_or_else(PoisonError::into_inner);

        let loan = self.store.get_loan(loan_id)?;
        let now = time.now();
        let mut events = EventStore::new();

        let patch = if update.has_financial_changes() {
            if !loan.is_active() {
                return Err(LoanError::LoanNotActive { status: loan.status });
            }
            let rows = self.store.list_installments(loan_id)?;
            if rows.iter().any(|i| i.paid) {
                return Err(LoanError::LoanLocked { loan_id });
            }

            let principal = update.principal.unwrap_or(loan.principal_amount);
            let annual_rate = update.annual_rate.unwrap_or(loan.annual_rate);
            let start_date = update.start_date.unwrap_or(loan.start_date);
            let interest_type = update.interest_type.unwrap_or(loan.interest_type);

            // same exactly-one rule as creation; with neither supplied the
            // tenure is kept and the EMI repriced
            let (tenure_months, emi) = match (update.tenure_months, update.emi) {
                (Some(_), Some(_)) => return Err(LoanError::MissingLoanTerms),
                (Some(n), None) => (Some(n), None),
                (None, Some(e)) => (None, Some(e)),
                (None, None) => (Some(loan.tenure_months), None),
            };

            let summary =
                calculate_loan_summary(principal, annual_rate, tenure_months, emi, interest_type)?;
            let schedule = AmortizationSchedule::generate(
                principal,
                annual_rate,
                summary.emi,
                summary.tenure_months,
                interest_type,
            );
            let rows: Vec<Installment> = schedule
                .rows
                .iter()
                .map(|line| Installment::from_line(loan_id, start_date, line))
                .collect();

            events.emit(Event::TermsUpdated {
                loan_id,
                financial: true,
                timestamp: now,
            });
            events.emit(Event::ScheduleRegenerated {
                loan_id,
                from_period: 1,
                periods: summary.tenure_months,
                timestamp: now,
            });

            LoanPatch {
                replace_future: Some(ReplaceFuture {
                    from_period: 1,
                    rows,
                }),
                fields: Some(LoanFieldsUpdate {
                    lender_name: update.lender_name,
                    loan_type: update.loan_type,
                    principal_amount: Some(principal),
                    annual_rate: Some(annual_rate),
                    tenure_months: Some(summary.tenure_months),
                    emi_amount: Some(summary.emi),
                    start_date: Some(start_date),
                    interest_type: Some(interest_type),
                    total_payable: Some(summary.total_payable),
                    total_interest: Some(summary.total_interest),
                    outstanding_principal: Some(principal),
                }),
                ..Default::default()
            }
        } else {
            events.emit(Event::TermsUpdated {
                loan_id,
                financial: false,
                timestamp: now,
            });

            LoanPatch {
                fields: Some(LoanFieldsUpdate {
                    lender_name: update.lender_name,
                    loan_type: update.loan_type,
                    ..Default::default()
                }),
                ..Default::default()
            }
        };

        let loan = self.store.apply(loan_id, loan.revision, patch)?;

        info!("updated terms of loan {}", loan_id);

        Ok(TermsReceipt {
            loan,
            events: events.take_events(),
        })
    }

    /// foreclose a loan: quote the payoff, discard unpaid installments, and
    /// mark the loan closed early
    pub fn close_early(
        &self,
        loan_id: LoanId,
        foreclosure_fee_percent: Decimal,
        time: &SafeTimeProvider,
    ) -> Result<ClosureReceipt> {
        let gate = self.gate(loan_id);
        let _serial = gate.lock().unwrap_or_else(PoisonError::into_inner);

        let loan = self.store.get_loan(loan_id)?;
        if !loan.is_active() {
            return Err(LoanError::LoanNotActive { status: loan.status });
        }

        let unpaid = self.store.list_unpaid_installments(loan_id)?;
        let remaining_interest = unpaid
            .iter()
            .map(|i| i.interest_component)
            .fold(Money::ZERO, |acc, x| acc + x);

        let quote = calculate_early_closure(
            loan.outstanding_principal,
            remaining_interest,
            foreclosure_fee_percent,
        );

        let from_period = unpaid
            .first()
            .map(|i| i.period)
            .unwrap_or(loan.tenure_months + 1);

        let now = time.now();
        let mut events = EventStore::new();
        events.emit(Event::LoanClosedEarly {
            loan_id,
            closure_amount: quote.closure_amount,
            interest_saved: quote.interest_saved,
            timestamp: now,
        });
        events.emit(Event::StatusChanged {
            loan_id,
            old_status: LoanStatus::Active,
            new_status: LoanStatus::ClosedEarly,
            timestamp: now,
        });

        let patch = LoanPatch {
            replace_future: Some(ReplaceFuture {
                from_period,
                rows: Vec::new(),
            }),
            fields: Some(LoanFieldsUpdate {
                outstanding_principal: Some(Money::ZERO),
                ..Default::default()
            }),
            status: Some(LoanStatus::ClosedEarly),
            ..Default::default()
        };

        let loan = self.store.apply(loan_id, loan.revision, patch)?;

        info!(
            "closed loan {} early for {} (interest saved {})",
            loan_id, quote.closure_amount, quote.interest_saved
        );

        Ok(ClosureReceipt {
            loan,
            quote,
            events: events.take_events(),
        })
    }

    pub fn loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.store.get_loan(loan_id)
    }

    pub fn schedule(&self, loan_id: LoanId) -> Result<Vec<Installment>> {
        self.store.list_installments(loan_id)
    }

    pub fn unpaid_installments(&self, loan_id: LoanId) -> Result<Vec<Installment>> {
        self.store.list_unpaid_installments(loan_id)
    }
}
