use crate::error::StoreError;
use crate::state::{parse_ticket_channel, TicketKind, TicketRecord};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// On-disk shape of a ticket, one object per open ticket.
#[derive(Serialize, Deserialize)]
pub struct SavedTicket {
    #[serde(rename = "type")]
    pub kind: TicketKind,
    #[serde(default)]
    pub user_id: Option<SavedUserId>,
    #[serde(default)]
    pub user_mention: Option<String>,
    #[serde(default)]
    pub td_mention: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
}

/// Snowflakes are written as strings but older files may hold numbers.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
pub enum SavedUserId {
    Number(u64),
    Text(String),
}

impl SavedUserId {
    fn value(&self) -> Option<u64> {
        match self {
            SavedUserId::Number(id) => Some(*id),
            SavedUserId::Text(text) => text.parse().ok(),
        }
    }
}

impl From<&TicketRecord> for SavedTicket {
    fn from(record: &TicketRecord) -> Self {
        SavedTicket {
            kind: record.kind,
            user_id: record.requester_id.map(|id| SavedUserId::Text(id.to_string())),
            user_mention: record.requester_mention.clone(),
            td_mention: record.support_mention.clone(),
            channel_name: Some(record.channel_name()),
        }
    }
}

impl SavedTicket {
    fn into_record(self) -> Option<TicketRecord> {
        let channel_name = self.channel_name?;
        let (kind, sequence_number) = parse_ticket_channel(&channel_name)?;
        if kind != self.kind {
            return None;
        }
        Some(TicketRecord {
            kind,
            sequence_number,
            requester_id: self.user_id.as_ref().and_then(SavedUserId::value),
            requester_mention: self.user_mention,
            support_mention: self.td_mention,
        })
    }
}

/// JSON file holding the open tickets between restarts.
#[derive(Clone, Debug)]
pub struct TicketStore {
    path: PathBuf,
}

impl TicketStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the saved tickets. A missing or unreadable file is an empty set.
    pub fn load(&self) -> Vec<TicketRecord> {
        if !self.path.exists() {
            log::info!(
                "No tickets file at {}, starting with an empty state.",
                self.path.display()
            );
            return Vec::new();
        }

        let rows = match fs::read_to_string(&self.path)
            .map_err(StoreError::from)
            .and_then(|json| {
                serde_json::from_str::<Vec<serde_json::Value>>(&json).map_err(StoreError::from)
            }) {
            Ok(rows) => rows,
            Err(err) => {
                log::warn!(
                    "Ignoring unreadable tickets file {}: {}",
                    self.path.display(),
                    err
                );
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| {
                let ticket = match serde_json::from_value::<SavedTicket>(row.clone()) {
                    Ok(ticket) => ticket,
                    Err(err) => {
                        log::warn!("Skipping malformed saved ticket {}: {}", row, err);
                        return None;
                    }
                };
                let name = ticket.channel_name.clone();
                let record = ticket.into_record();
                if record.is_none() {
                    log::warn!("Skipping saved ticket with channel name {:?}", name);
                }
                record
            })
            .collect()
    }

    /// Replaces the file with `records`, writing through a temp file so a
    /// crash never leaves a truncated document behind.
    pub fn save(&self, records: &[TicketRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut sorted: Vec<&TicketRecord> = records.iter().collect();
        sorted.sort_by_key(|record| (record.kind, record.sequence_number));
        let saved: Vec<SavedTicket> = sorted.into_iter().map(SavedTicket::from).collect();
        let json = serde_json::to_string_pretty(&saved)?;

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "tickets.json".to_string());
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let temp_path = self.path.with_file_name(format!(".{file_name}.{nanos}.tmp"));

        let written = fs::write(&temp_path, format!("{json}\n"))
            .and_then(|()| fs::rename(&temp_path, &self.path));
        if let Err(err) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }
        Ok(())
    }
}
