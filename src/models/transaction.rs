use crate::error::ProcessError;
use chrono::{DateTime, Duration, Utc};
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Clock skew accepted between the caller stamping `transactionDate` and the
/// request reaching us.
pub const PRESENT_TOLERANCE_SECS: i64 = 5;

/// Decimal places the ledger stores amounts with.
pub const AMOUNT_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "transaction_type")]
pub enum TransactionType {
    #[postgres(name = "DEPOSIT")]
    Deposit,
    #[postgres(name = "WITHDRAWAL")]
    Withdrawal,
    #[postgres(name = "TRANSFER")]
    Transfer,
    #[postgres(name = "CREDIT_PAYMENT")]
    CreditPayment,
    #[postgres(name = "CREDIT_CARD_PAYMENT")]
    CreditCardPayment,
}

impl TransactionType {
    pub const ALL: [Self; 5] = [
        Self::Deposit,
        Self::Withdrawal,
        Self::Transfer,
        Self::CreditPayment,
        Self::CreditCardPayment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdrawal => "WITHDRAWAL",
            Self::Transfer => "TRANSFER",
            Self::CreditPayment => "CREDIT_PAYMENT",
            Self::CreditCardPayment => "CREDIT_CARD_PAYMENT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProcessError::UnsupportedOperation(s.to_string()))
    }
}

/// An operation as submitted by a client.
///
/// The type is kept as the raw string so that an unknown type still reaches
/// the dispatcher and is rejected there as unsupported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(alias = "type")]
    pub transaction_type: String,
    pub origin_account_id: Option<String>,
    pub destination_account_id: Option<String>,
    pub credit_id: Option<String>,
    pub credit_card_id: Option<String>,
    pub debit_card_id: Option<String>,
    pub amount: Decimal,
    pub transaction_date: DateTime<Utc>,
}

impl TransactionRequest {
    pub fn kind(&self) -> Result<TransactionType, ProcessError> {
        self.transaction_type.parse()
    }

    /// Full request validation, including the date check, as done at the
    /// HTTP edge before the dispatcher is invoked.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<TransactionType, ProcessError> {
        let kind = self.kind()?;
        self.check_shape(kind)?;

        if self.transaction_date < now - Duration::seconds(PRESENT_TOLERANCE_SECS) {
            return Err(ProcessError::Validation(
                "transactionDate must be now or in the future".into(),
            ));
        }

        Ok(kind)
    }

    /// Checks that can be made without a clock: amount sign and the
    /// identifiers the given type needs.
    pub fn check_shape(&self, kind: TransactionType) -> Result<(), ProcessError> {
        if self.amount <= Decimal::ZERO {
            return Err(ProcessError::Validation(
                "amount must be greater than zero".into(),
            ));
        }

        if self.amount.normalize().scale() > AMOUNT_SCALE {
            return Err(ProcessError::Validation(format!(
                "amount must have at most {} decimal places",
                AMOUNT_SCALE
            )));
        }

        match kind {
            TransactionType::Deposit => self.destination_account().map(|_| ()),
            TransactionType::Withdrawal => self.origin_account().map(|_| ()),
            TransactionType::Transfer => {
                if self.origin_account()? == self.destination_account()? {
                    return Err(ProcessError::Validation(
                        "originAccountId and destinationAccountId must differ".into(),
                    ));
                }
                Ok(())
            }
            TransactionType::CreditPayment => self.credit().map(|_| ()),
            TransactionType::CreditCardPayment => self.credit_card().map(|_| ()),
        }
    }

    pub fn origin_account(&self) -> Result<&str, ProcessError> {
        required("originAccountId", &self.origin_account_id)
    }

    pub fn destination_account(&self) -> Result<&str, ProcessError> {
        required("destinationAccountId", &self.destination_account_id)
    }

    pub fn credit(&self) -> Result<&str, ProcessError> {
        required("creditId", &self.credit_id)
    }

    pub fn credit_card(&self) -> Result<&str, ProcessError> {
        required("creditCardId", &self.credit_card_id)
    }
}

fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, ProcessError> {
    match value.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ProcessError::Validation(format!("{} is required", field))),
    }
}

/// What the ledger keeps for every operation that mutated remote state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub transaction_type: TransactionType,
    pub origin_account_id: Option<String>,
    pub destination_account_id: Option<String>,
    pub credit_id: Option<String>,
    pub credit_card_id: Option<String>,
    pub debit_card_id: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    pub transaction_date: DateTime<Utc>,
}

impl TransactionRecord {
    /// The type comes from the handler that ran, not from the request body.
    pub fn new(kind: TransactionType, request: &TransactionRequest) -> Self {
        Self {
            id: None,
            transaction_type: kind,
            origin_account_id: request.origin_account_id.clone(),
            destination_account_id: request.destination_account_id.clone(),
            credit_id: request.credit_id.clone(),
            credit_card_id: request.credit_card_id.clone(),
            debit_card_id: request.debit_card_id.clone(),
            amount: request.amount,
            commission: Decimal::ZERO,
            transaction_date: request.transaction_date,
        }
    }

    /// One line summary published to the event bus.
    pub fn describe(&self) -> String {
        let mut refs = Vec::new();
        let fields = [
            ("origin", &self.origin_account_id),
            ("destination", &self.destination_account_id),
            ("credit", &self.credit_id),
            ("creditCard", &self.credit_card_id),
            ("debitCard", &self.debit_card_id),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                refs.push(format!("{}={}", name, value));
            }
        }

        format!(
            "{} #{} of {} processed ({}) at {}",
            self.transaction_type,
            self.id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            self.amount,
            refs.join(", "),
            self.transaction_date.to_rfc3339(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerQuery {
    ByOriginAccount(String),
    ByDestinationAccount(String),
    /// Either side of the operation.
    ByAccount(String),
    ByCredit(String),
    ByCreditCard(String),
    ByDebitCard(String),
    /// Inclusive on both ends.
    ByDateRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    ByType(TransactionType),
}

impl LedgerQuery {
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        let is = |field: &Option<String>, id: &str| field.as_deref() == Some(id);

        match self {
            Self::ByOriginAccount(id) => is(&record.origin_account_id, id),
            Self::ByDestinationAccount(id) => is(&record.destination_account_id, id),
            Self::ByAccount(id) => {
                is(&record.origin_account_id, id) || is(&record.destination_account_id, id)
            }
            Self::ByCredit(id) => is(&record.credit_id, id),
            Self::ByCreditCard(id) => is(&record.credit_card_id, id),
            Self::ByDebitCard(id) => is(&record.debit_card_id, id),
            Self::ByDateRange { from, to } => {
                *from <= record.transaction_date && record.transaction_date <= *to
            }
            Self::ByType(kind) => record.transaction_type == *kind,
        }
    }
}
