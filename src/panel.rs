use crate::commands::ComponentAction;
use crate::directory::Directory;
use crate::error::PlatformError;
use crate::messages::{Catalog, MessageKey};
use crate::platform::{ChannelHandle, ChatPlatform, Grant, PermissionRule, PermissionTarget};
use crate::state::TicketKind;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PanelOutcome {
    Posted(ChannelHandle),
    AlreadyPresent(ChannelHandle),
}

/// Keeps the read-only entry channel and its ticket buttons in place.
pub struct PanelPresenter {
    platform: Arc<dyn ChatPlatform>,
    directory: Arc<Directory>,
    entry_channel_name: String,
    support_email: String,
    catalog: Catalog,
}

impl PanelPresenter {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        directory: Arc<Directory>,
        entry_channel_name: impl Into<String>,
        support_email: impl Into<String>,
        catalog: Catalog,
    ) -> Self {
        Self {
            platform,
            directory,
            entry_channel_name: entry_channel_name.into(),
            support_email: support_email.into(),
            catalog,
        }
    }

    /// Creates the category and entry channel when missing and posts the
    /// panel if the channel has no messages yet.
    pub async fn ensure_entry_point(&self) -> Result<PanelOutcome, PlatformError> {
        let category = self.directory.category().await?;

        let existing = self
            .platform
            .list_channels(&category, &self.entry_channel_name)
            .await?
            .into_iter()
            .find(|channel| channel.name == self.entry_channel_name);
        let channel = match existing {
            Some(channel) => channel,
            None => {
                log::info!("Creating channel #{}", self.entry_channel_name);
                let rules = [
                    PermissionRule::new(PermissionTarget::Everyone, Grant::Allow, Grant::Deny),
                    PermissionRule::new(PermissionTarget::Bot, Grant::Allow, Grant::Allow),
                ];
                self.platform
                    .create_channel(&category, &self.entry_channel_name, &rules)
                    .await?
            }
        };

        if self.platform.has_messages(&channel).await? {
            return Ok(PanelOutcome::AlreadyPresent(channel));
        }

        let support = self.directory.support_mention().await?;
        let content = self.catalog.render(
            MessageKey::Instructions,
            &[("support", &support), ("email", &self.support_email)],
        );
        let buttons: Vec<_> = TicketKind::ALL
            .into_iter()
            .map(|kind| ComponentAction::Create(kind).button())
            .collect();
        self.platform.send_message(&channel, &content, &buttons).await?;
        Ok(PanelOutcome::Posted(channel))
    }
}
