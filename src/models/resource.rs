//! Point-in-time snapshots of the resources owned by the account, credit and
//! credit card services.
//!
//! A snapshot only names the fields the processor reads or writes. Everything
//! else the owning service returns is kept in `extra` and sent back verbatim,
//! so a replace never drops data it did not understand.

use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Account,
    Credit,
    CreditCard,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Account => "account",
            Self::Credit => "credit",
            Self::CreditCard => "credit card",
        })
    }
}

/// A remote resource with a single monetary field the pipeline mutates.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn id(&self) -> &str;
    fn status(&self) -> Status;
    /// Balance for accounts and cards, outstanding debt for credits.
    fn value(&self) -> Decimal;
    fn set_value(&mut self, value: Decimal);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub status: Status,
    pub balance: Decimal,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credit {
    pub id: String,
    pub status: Status,
    pub debt: Decimal,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCard {
    pub id: String,
    pub status: Status,
    pub balance: Decimal,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Resource for Account {
    const KIND: ResourceKind = ResourceKind::Account;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Status {
        self.status
    }

    fn value(&self) -> Decimal {
        self.balance
    }

    fn set_value(&mut self, value: Decimal) {
        self.balance = value;
    }
}

impl Resource for Credit {
    const KIND: ResourceKind = ResourceKind::Credit;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Status {
        self.status
    }

    fn value(&self) -> Decimal {
        self.debt
    }

    fn set_value(&mut self, value: Decimal) {
        self.debt = value;
    }
}

impl Resource for CreditCard {
    const KIND: ResourceKind = ResourceKind::CreditCard;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Status {
        self.status
    }

    fn value(&self) -> Decimal {
        self.balance
    }

    fn set_value(&mut self, value: Decimal) {
        self.balance = value;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_account_keeps_unknown_fields() {
        let remote = json!({
            "id": "A1",
            "status": "ACTIVE",
            "balance": "1000.00",
            "customerId": "CU-7",
            "accountNumber": "001-2234",
        });

        let mut account: Account = serde_json::from_value(remote).unwrap();
        account.set_value(dec!(1200.00));

        assert_eq!(
            serde_json::to_value(&account).unwrap(),
            json!({
                "id": "A1",
                "status": "ACTIVE",
                "balance": "1200.00",
                "customerId": "CU-7",
                "accountNumber": "001-2234",
            })
        );
    }

    #[test]
    fn test_credit_value_is_debt() {
        let credit: Credit = serde_json::from_value(json!({
            "id": "C1",
            "status": "INACTIVE",
            "debt": 1000,
        }))
        .unwrap();

        assert_eq!(credit.value(), dec!(1000));
        assert_eq!(credit.status(), Status::Inactive);
        assert_eq!(Credit::KIND, ResourceKind::Credit);
    }
}
