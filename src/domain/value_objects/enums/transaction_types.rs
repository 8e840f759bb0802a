use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TransactionType {
    #[default]
    Subscription,
    OneTime,
    Renewal,
    Upgrade,
    Downgrade,
}

impl TransactionType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "subscription" => Some(TransactionType::Subscription),
            "one_time" => Some(TransactionType::OneTime),
            "renewal" => Some(TransactionType::Renewal),
            "upgrade" => Some(TransactionType::Upgrade),
            "downgrade" => Some(TransactionType::Downgrade),
            _ => None,
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transaction_type = match self {
            TransactionType::Subscription => "subscription",
            TransactionType::OneTime => "one_time",
            TransactionType::Renewal => "renewal",
            TransactionType::Upgrade => "upgrade",
            TransactionType::Downgrade => "downgrade",
        };
        write!(f, "{}", transaction_type)
    }
}
