use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// What the ticket is about. The slug doubles as the channel name prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketKind {
    Pipeline,
    Farm,
}

impl TicketKind {
    pub const ALL: [TicketKind; 2] = [TicketKind::Pipeline, TicketKind::Farm];

    pub fn slug(&self) -> &'static str {
        match self {
            TicketKind::Pipeline => "pipeline",
            TicketKind::Farm => "farm",
        }
    }

    /// Prefix shared by every channel of this kind, e.g. `farm-ticket-`.
    pub fn channel_prefix(&self) -> String {
        format!("{}-ticket-", self.slug())
    }

    pub fn channel_name(&self, number: u32) -> String {
        format!("{}{:03}", self.channel_prefix(), number)
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Parses `{pipeline|farm}-ticket-NNN`. Only names this bot would generate are
/// accepted, so `farm-ticket-7` or `farm-ticket-0001` are not tickets.
pub fn parse_ticket_channel(name: &str) -> Option<(TicketKind, u32)> {
    TicketKind::ALL.into_iter().find_map(|kind| {
        let digits = name.strip_prefix(&kind.channel_prefix())?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let number: u32 = digits.parse().ok()?;
        (number > 0 && kind.channel_name(number) == name).then_some((kind, number))
    })
}

/// An open ticket. Requester fields are `None` for tickets adopted from
/// existing channels whose record was lost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketRecord {
    pub kind: TicketKind,
    pub sequence_number: u32,
    pub requester_id: Option<u64>,
    pub requester_mention: Option<String>,
    pub support_mention: Option<String>,
}

impl TicketRecord {
    pub fn channel_name(&self) -> String {
        self.kind.channel_name(self.sequence_number)
    }

    fn adopted(kind: TicketKind, sequence_number: u32) -> Self {
        Self {
            kind,
            sequence_number,
            requester_id: None,
            requester_mention: None,
            support_mention: None,
        }
    }
}

/// Outcome of aligning the registry with the channels that actually exist.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub dropped: Vec<TicketRecord>,
    pub adopted: Vec<TicketRecord>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.dropped.is_empty() && self.adopted.is_empty()
    }
}

/// In-memory set of open tickets, keyed by (kind, sequence number).
#[derive(Debug, Default)]
pub struct TicketRegistry {
    tickets: BTreeMap<(TicketKind, u32), TicketRecord>,
}

impl TicketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from persisted records, skipping duplicates.
    pub fn from_records(records: impl IntoIterator<Item = TicketRecord>) -> Self {
        let mut registry = Self::new();
        for record in records {
            if let Err(err) = registry.register(record) {
                log::warn!("Skipping persisted ticket: {}", err);
            }
        }
        registry
    }

    /// Smallest positive number not used by an open ticket of `kind`.
    pub fn next_sequence_number(&self, kind: TicketKind) -> u32 {
        let mut candidate = 1;
        for &(_, number) in self.tickets.range((kind, 1)..=(kind, u32::MAX)).map(|(k, _)| k) {
            if number != candidate {
                break;
            }
            candidate += 1;
        }
        candidate
    }

    pub fn register(&mut self, record: TicketRecord) -> Result<(), RegistryError> {
        let key = (record.kind, record.sequence_number);
        if self.tickets.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                kind: record.kind,
                number: record.sequence_number,
            });
        }
        self.tickets.insert(key, record);
        Ok(())
    }

    /// Removes the ticket living in `channel_name`, if any.
    pub fn remove(&mut self, channel_name: &str) -> Option<TicketRecord> {
        let key = parse_ticket_channel(channel_name)?;
        self.tickets.remove(&key)
    }

    pub fn get(&self, channel_name: &str) -> Option<&TicketRecord> {
        let key = parse_ticket_channel(channel_name)?;
        self.tickets.get(&key)
    }

    pub fn all(&self) -> Vec<TicketRecord> {
        self.tickets.values().cloned().collect()
    }

    /// Registers a placeholder for every ticket channel name that has no
    /// record yet. Non-ticket names are ignored.
    pub fn adopt<'a>(
        &mut self,
        channel_names: impl IntoIterator<Item = &'a str>,
    ) -> Vec<TicketRecord> {
        let mut adopted = Vec::new();
        for (kind, number) in channel_names.into_iter().filter_map(parse_ticket_channel) {
            if self.tickets.contains_key(&(kind, number)) {
                continue;
            }
            let record = TicketRecord::adopted(kind, number);
            self.tickets.insert((kind, number), record.clone());
            adopted.push(record);
        }
        adopted
    }

    /// Drops records whose channel is missing from `channel_names` and adopts
    /// ticket channels that have no record.
    pub fn reconcile(&mut self, channel_names: &[String]) -> Reconciliation {
        let existing: HashSet<&str> = channel_names.iter().map(String::as_str).collect();
        let missing: Vec<(TicketKind, u32)> = self
            .tickets
            .values()
            .filter(|record| !existing.contains(record.channel_name().as_str()))
            .map(|record| (record.kind, record.sequence_number))
            .collect();
        let dropped = missing
            .into_iter()
            .filter_map(|key| self.tickets.remove(&key))
            .collect();
        let adopted = self.adopt(channel_names.iter().map(String::as_str));
        Reconciliation { dropped, adopted }
    }
}

#[cfg(test)]
pub(crate) fn record(kind: TicketKind, sequence_number: u32) -> TicketRecord {
    TicketRecord {
        kind,
        sequence_number,
        requester_id: Some(42),
        requester_mention: Some("<@42>".to_string()),
        support_mention: Some("<@&7>".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_number_starts_at_one_for_every_kind() {
        let registry = TicketRegistry::new();
        for kind in TicketKind::ALL {
            assert_eq!(registry.next_sequence_number(kind), 1);
        }
    }

    #[test]
    fn next_number_fills_gaps_left_by_closed_tickets() {
        let mut registry = TicketRegistry::new();
        for n in 1..=3 {
            registry.register(record(TicketKind::Farm, n)).unwrap();
        }
        assert_eq!(registry.next_sequence_number(TicketKind::Farm), 4);

        registry.remove("farm-ticket-002").unwrap();
        assert_eq!(registry.next_sequence_number(TicketKind::Farm), 2);
    }

    #[test]
    fn numbering_is_independent_per_kind() {
        let mut registry = TicketRegistry::new();
        registry.register(record(TicketKind::Pipeline, 1)).unwrap();
        registry.register(record(TicketKind::Pipeline, 2)).unwrap();
        assert_eq!(registry.next_sequence_number(TicketKind::Farm), 1);
        assert_eq!(registry.next_sequence_number(TicketKind::Pipeline), 3);
    }

    #[test]
    fn register_rejects_duplicate_numbers() {
        let mut registry = TicketRegistry::new();
        registry.register(record(TicketKind::Pipeline, 5)).unwrap();
        let err = registry.register(record(TicketKind::Pipeline, 5)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::Duplicate {
                kind: TicketKind::Pipeline,
                number: 5
            }
        );
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn remove_unknown_channel_is_a_no_op() {
        let mut registry = TicketRegistry::new();
        registry.register(record(TicketKind::Farm, 1)).unwrap();
        assert!(registry.remove("farm-ticket-009").is_none());
        assert!(registry.remove("general").is_none());
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn parses_only_generated_channel_names() {
        assert_eq!(
            parse_ticket_channel("pipeline-ticket-001"),
            Some((TicketKind::Pipeline, 1))
        );
        assert_eq!(parse_ticket_channel("farm-ticket-1234"), Some((TicketKind::Farm, 1234)));
        assert_eq!(parse_ticket_channel("farm-ticket-7"), None);
        assert_eq!(parse_ticket_channel("farm-ticket-0001"), None);
        assert_eq!(parse_ticket_channel("farm-ticket-000"), None);
        assert_eq!(parse_ticket_channel("farm-ticket-01a"), None);
        assert_eq!(parse_ticket_channel("create-ticket"), None);
    }

    #[test]
    fn reconcile_drops_missing_and_adopts_untracked_channels() {
        let mut registry = TicketRegistry::new();
        registry.register(record(TicketKind::Pipeline, 1)).unwrap();
        registry.register(record(TicketKind::Pipeline, 2)).unwrap();

        let existing = vec![
            "create-ticket".to_string(),
            "pipeline-ticket-001".to_string(),
            "farm-ticket-003".to_string(),
        ];
        let outcome = registry.reconcile(&existing);

        assert_eq!(outcome.dropped, vec![record(TicketKind::Pipeline, 2)]);
        assert_eq!(outcome.adopted.len(), 1);
        assert_eq!(outcome.adopted[0].channel_name(), "farm-ticket-003");
        assert_eq!(outcome.adopted[0].requester_id, None);
        assert_eq!(registry.all().len(), 2);
        assert!(registry.get("pipeline-ticket-001").is_some());
    }
}
