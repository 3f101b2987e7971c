use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Finance,
}

/// The caller of a lifecycle operation.
///
/// Identity is passed explicitly into every operation. For employees, `id` is
/// their employee id and is what ownership of a payment is checked against.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct Actor {
    pub id: u32,
    pub role: Role,
}

impl Actor {
    pub fn employee(id: u32) -> Self {
        Self {
            id,
            role: Role::Employee,
        }
    }

    pub fn finance(id: u32) -> Self {
        Self {
            id,
            role: Role::Finance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Confirm,
    Approve,
    Transfer,
    ConfirmPayment,
    RequestAllocation,
    ApproveAllocation,
    RejectAllocation,
    Cancel,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Confirm => "confirm",
            Action::Approve => "approve",
            Action::Transfer => "transfer",
            Action::ConfirmPayment => "confirm-payment",
            Action::RequestAllocation => "request-allocation",
            Action::ApproveAllocation => "approve-allocation",
            Action::RejectAllocation => "reject-allocation",
            Action::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_match_serde() {
        let json = serde_json::to_string(&Action::ConfirmPayment).unwrap();
        assert_eq!(json, "\"confirm-payment\"");
        assert_eq!(Action::ConfirmPayment.to_string(), "confirm-payment");

        let parsed: Action = serde_json::from_str("\"request-allocation\"").unwrap();
        assert_eq!(parsed, Action::RequestAllocation);
    }
}
