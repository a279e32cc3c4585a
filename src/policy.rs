use crate::platform::{Actor, RoleHandle};
use crate::state::TicketRecord;

/// Decides who may close a ticket.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClosePolicy {
    /// Also let the user who opened the ticket close it.
    pub allow_requester: bool,
}

impl ClosePolicy {
    pub fn new(allow_requester: bool) -> Self {
        Self { allow_requester }
    }

    /// Holders of the support role and administrators may close any ticket.
    /// A missing support role grants nothing.
    pub fn can_close(
        &self,
        actor: &Actor,
        support_role: Option<&RoleHandle>,
        ticket: Option<&TicketRecord>,
    ) -> bool {
        if actor.administrator {
            return true;
        }
        if support_role.is_some_and(|role| actor.role_ids.contains(&role.id)) {
            return true;
        }
        self.allow_requester
            && ticket.is_some_and(|ticket| ticket.requester_id == Some(actor.user_id))
    }
}
