use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::types::InterestType;

/// validated input for creating a loan
///
/// exactly one of `tenure_months` and `emi` is supplied; the solver derives
/// the other
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub lender_name: String,
    pub loan_type: String,
    pub principal: Money,
    pub annual_rate: Rate,
    pub tenure_months: Option<u32>,
    pub emi: Option<Money>,
    pub start_date: NaiveDate,
    pub interest_type: InterestType,
}

impl LoanApplication {
    pub fn builder() -> LoanApplicationBuilder {
        LoanApplicationBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.principal.is_positive() {
            return Err(LoanError::InvalidLoanTerms {
                message: format!("principal must be positive, got {}", self.principal),
            });
        }
        if self.annual_rate.is_negative() {
            return Err(LoanError::InvalidLoanTerms {
                message: format!("annual rate must not be negative, got {}", self.annual_rate),
            });
        }
        match (self.tenure_months, self.emi) {
            (Some(0), None) => Err(LoanError::InvalidLoanTerms {
                message: "tenure must be at least one month".to_string(),
            }),
            (None, Some(e)) if !e.is_positive() => Err(LoanError::InvalidLoanTerms {
                message: format!("emi must be positive, got {}", e),
            }),
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(LoanError::MissingLoanTerms),
        }
    }
}

/// builder for loan applications
pub struct LoanApplicationBuilder {
    lender_name: Option<String>,
    loan_type: Option<String>,
    principal: Option<Money>,
    annual_rate: Option<Rate>,
    tenure_months: Option<u32>,
    emi: Option<Money>,
    start_date: Option<NaiveDate>,
    interest_type: InterestType,
}

impl LoanApplicationBuilder {
    pub fn new() -> Self {
        Self {
            lender_name: None,
            loan_type: None,
            principal: None,
            annual_rate: None,
            tenure_months: None,
            emi: None,
            start_date: None,
            interest_type: InterestType::Reducing,
        }
    }

    pub fn lender_name(mut self, name: impl Into<String>) -> Self {
        self.lender_name = Some(name.into());
        self
    }

    pub fn loan_type(mut self, loan_type: impl Into<String>) -> Self {
        self.loan_type = Some(loan_type.into());
        self
    }

    pub fn principal(mut self, principal: Money) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn annual_rate(mut self, rate: Rate) -> Self {
        self.annual_rate = Some(rate);
        self
    }

    pub fn tenure_months(mut self, months: u32) -> Self {
        self.tenure_months = Some(months);
        self
    }

    pub fn emi(mut self, emi: Money) -> Self {
        self.emi = Some(emi);
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn interest_type(mut self, interest_type: InterestType) -> Self {
        self.interest_type = interest_type;
        self
    }

    pub fn build(self) -> Result<LoanApplication> {
        let lender_name = self.lender_name.ok_or(LoanError::InvalidLoanTerms {
            message: "lender name required".to_string(),
        })?;
        let principal = self.principal.ok_or(LoanError::InvalidLoanTerms {
            message: "principal required".to_string(),
        })?;
        let annual_rate = self.annual_rate.ok_or(LoanError::InvalidLoanTerms {
            message: "annual rate required".to_string(),
        })?;
        let start_date = self.start_date.ok_or(LoanError::InvalidLoanTerms {
            message: "start date required".to_string(),
        })?;

        let application = LoanApplication {
            lender_name,
            loan_type: self.loan_type.unwrap_or_else(|| "personal".to_string()),
            principal,
            annual_rate,
            tenure_months: self.tenure_months,
            emi: self.emi,
            start_date,
            interest_type: self.interest_type,
        };

        application.validate()?;
        Ok(application)
    }
}

impl Default for LoanApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// partial update to a loan's terms
///
/// financial fields are rejected with `LoanLocked` once any installment has
/// been paid; descriptive fields stay editable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanTermsUpdate {
    pub lender_name: Option<String>,
    pub loan_type: Option<String>,
    pub principal: Option<Money>,
    pub annual_rate: Option<Rate>,
    pub tenure_months: Option<u32>,
    pub emi: Option<Money>,
    pub start_date: Option<NaiveDate>,
    pub interest_type: Option<InterestType>,
}

impl LoanTermsUpdate {
    pub fn has_financial_changes(&self) -> bool {
        self.principal.is_some()
            || self.annual_rate.is_some()
            || self.tenure_months.is_some()
            || self.emi.is_some()
            || self.start_date.is_some()
            || self.interest_type.is_some()
    }
}
