use crate::platform::{Button, ButtonStyle};
use crate::state::TicketKind;

/// Text commands understood in guild channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Close the ticket the command was sent in
    Close,
    /// Check that the bot is alive
    Hello,
}

impl Command {
    /// Parses `{prefix}{name}`; trailing arguments are ignored.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        let name = content.trim().strip_prefix(prefix)?.split_whitespace().next()?;
        match name.to_ascii_lowercase().as_str() {
            "close" => Some(Command::Close),
            "hello" => Some(Command::Hello),
            _ => None,
        }
    }
}

/// Buttons the bot attaches to its messages. The custom ids never change, so
/// buttons posted before a restart keep working.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentAction {
    Create(TicketKind),
    Close,
}

impl ComponentAction {
    pub fn custom_id(&self) -> &'static str {
        match self {
            ComponentAction::Create(TicketKind::Pipeline) => "ticket_silex",
            ComponentAction::Create(TicketKind::Farm) => "ticket_farm",
            ComponentAction::Close => "close_ticket",
        }
    }

    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        [
            ComponentAction::Create(TicketKind::Pipeline),
            ComponentAction::Create(TicketKind::Farm),
            ComponentAction::Close,
        ]
        .into_iter()
        .find(|action| action.custom_id() == custom_id)
    }

    pub fn button(&self) -> Button {
        let (label, emoji, style) = match self {
            ComponentAction::Create(TicketKind::Pipeline) => {
                ("Ticket Silex", "🪨", ButtonStyle::Success)
            }
            ComponentAction::Create(TicketKind::Farm) => {
                ("Ticket Farm", "🖥️", ButtonStyle::Secondary)
            }
            ComponentAction::Close => ("Close Ticket", "🗑️", ButtonStyle::Danger),
        };
        Button {
            custom_id: self.custom_id(),
            label,
            emoji,
            style,
        }
    }
}
