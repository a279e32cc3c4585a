use crate::error::ConfigError;
use crate::messages::Locale;
use std::env;
use std::path::PathBuf;

/// Who may see and write in a freshly created ticket channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketAccess {
    /// Everyone can read and write.
    Public,
    /// Only the requester, the support role and the bot.
    Private,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub token: String,
    pub guild_id: Option<u64>,
    pub tickets_path: PathBuf,
    pub category_name: String,
    pub entry_channel_name: String,
    pub support_role_name: String,
    pub support_email: String,
    pub command_prefix: String,
    pub ticket_access: TicketAccess,
    pub allow_requester_close: bool,
    pub locales: Vec<Locale>,
}

impl Config {
    /// Reads the configuration from the process environment. Call
    /// `dotenv().ok()` first to pick up a local `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let guild_id = get("GUILD_ID")
            .map(|value| {
                value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                    name: "GUILD_ID",
                    value,
                })
            })
            .transpose()?;

        let ticket_access = match get("TICKET_ACCESS").as_deref().map(str::trim) {
            None | Some("public") => TicketAccess::Public,
            Some("private") => TicketAccess::Private,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "TICKET_ACCESS",
                    value: other.to_string(),
                })
            }
        };

        let allow_requester_close = match get("ALLOW_REQUESTER_CLOSE").as_deref().map(str::trim) {
            None | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "ALLOW_REQUESTER_CLOSE",
                    value: other.to_string(),
                })
            }
        };

        let locales = match get("LOCALES") {
            None => vec![Locale::Fr, Locale::En],
            Some(value) => {
                let parsed: Option<Vec<Locale>> = value
                    .split(',')
                    .map(|code| Locale::from_code(code.trim()))
                    .collect();
                match parsed {
                    Some(locales) if !locales.is_empty() => locales,
                    _ => return Err(ConfigError::Invalid { name: "LOCALES", value }),
                }
            }
        };

        Ok(Config {
            token,
            guild_id,
            tickets_path: PathBuf::from(or("TICKETS_FILE", "tickets.json")),
            category_name: or("TICKET_CATEGORY", "HELP Pipeline/Renderfarm"),
            entry_channel_name: or("ENTRY_CHANNEL", "create-ticket"),
            support_role_name: or("SUPPORT_ROLE", "Technical Director"),
            support_email: or("SUPPORT_EMAIL", "5-td-mtp@artfx.fr"),
            command_prefix: or("COMMAND_PREFIX", "!"),
            ticket_access,
            allow_requester_close,
            locales,
        })
    }
}
