use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{LoanId, LoanStatus, PrepaymentStrategy};

/// all events emitted by ledger operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    LoanCreated {
        loan_id: LoanId,
        principal: Money,
        emi: Money,
        tenure_months: u32,
        timestamp: DateTime<Utc>,
    },
    PaymentRecorded {
        loan_id: LoanId,
        period: u32,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    PrepaymentApplied {
        loan_id: LoanId,
        amount: Money,
        strategy: PrepaymentStrategy,
        new_emi: Money,
        new_tenure_months: u32,
        interest_saved: Money,
        timestamp: DateTime<Utc>,
    },
    ScheduleRegenerated {
        loan_id: LoanId,
        from_period: u32,
        periods: u32,
        timestamp: DateTime<Utc>,
    },
    TermsUpdated {
        loan_id: LoanId,
        financial: bool,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        timestamp: DateTime<Utc>,
    },
    LoanClosedEarly {
        loan_id: LoanId,
        closure_amount: Money,
        interest_saved: Money,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
