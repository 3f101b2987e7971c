//! The server-side guard table: which roles may perform which action from
//! which statuses, and where the action leads.

use crate::domain::actor::{Action, Actor, Role};
use crate::domain::payment::{PaymentRecord, PaymentStatus};
use crate::domain::ports::AccessPolicy;

use PaymentStatus::*;

#[derive(Debug)]
pub struct Guard {
    pub action: Action,
    pub from: &'static [PaymentStatus],
    pub roles: &'static [Role],
    /// `None` when the action leaves the status unchanged.
    pub to: Option<PaymentStatus>,
}

impl Guard {
    /// Role membership plus ownership: employees only ever act on their own
    /// payments.
    pub fn admits(&self, actor: &Actor, record: &PaymentRecord) -> bool {
        self.roles.contains(&actor.role)
            && (actor.role != Role::Employee || actor.id == record.employee().0)
    }

    pub fn accepts(&self, status: PaymentStatus) -> bool {
        self.from.contains(&status)
    }
}

pub const GUARDS: &[Guard] = &[
    Guard {
        action: Action::Confirm,
        from: &[PendingEmployeeConfirmation],
        roles: &[Role::Employee],
        to: Some(PendingFinanceApproval),
    },
    Guard {
        action: Action::Approve,
        from: &[PendingFinanceApproval],
        roles: &[Role::Finance],
        to: Some(PendingPayment),
    },
    Guard {
        action: Action::Transfer,
        from: &[PendingPayment],
        roles: &[Role::Finance],
        to: Some(PendingPaymentConfirmation),
    },
    Guard {
        action: Action::ConfirmPayment,
        from: &[PendingPaymentConfirmation],
        roles: &[Role::Finance],
        to: Some(Completed),
    },
    Guard {
        action: Action::RequestAllocation,
        from: &[PendingEmployeeConfirmation, PendingFinanceApproval],
        roles: &[Role::Employee, Role::Finance],
        to: None,
    },
    Guard {
        action: Action::ApproveAllocation,
        from: &[PendingFinanceApproval],
        roles: &[Role::Finance],
        to: None,
    },
    Guard {
        action: Action::RejectAllocation,
        from: &[PendingEmployeeConfirmation, PendingFinanceApproval],
        roles: &[Role::Finance],
        to: None,
    },
    Guard {
        action: Action::Cancel,
        from: &[
            PendingEmployeeConfirmation,
            PendingFinanceApproval,
            PendingPayment,
        ],
        roles: &[Role::Finance],
        to: Some(Cancelled),
    },
];

pub fn guard_for(action: Action) -> &'static Guard {
    GUARDS
        .iter()
        .find(|guard| guard.action == action)
        .unwrap_or_else(|| unreachable!("every action has a guard entry"))
}

/// Default identity provider: allows exactly the roles named in the guard
/// table.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleTablePolicy;

impl AccessPolicy for RoleTablePolicy {
    fn allows(&self, actor: &Actor, action: Action) -> bool {
        guard_for(action).roles.contains(&actor.role)
    }
}
