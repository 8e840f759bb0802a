use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PlanType {
    #[default]
    Free,
    Premium,
    Partner,
}

impl PlanType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "free" => Some(PlanType::Free),
            "premium" => Some(PlanType::Premium),
            "partner" => Some(PlanType::Partner),
            _ => None,
        }
    }
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan_type = match self {
            PlanType::Free => "free",
            PlanType::Premium => "premium",
            PlanType::Partner => "partner",
        };
        write!(f, "{}", plan_type)
    }
}
