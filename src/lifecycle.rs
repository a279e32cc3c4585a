use crate::commands::ComponentAction;
use crate::config::TicketAccess;
use crate::directory::Directory;
use crate::error::{PlatformError, TicketError};
use crate::messages::{Catalog, MessageKey};
use crate::platform::{
    Actor, ChannelHandle, ChatPlatform, Grant, PermissionRule, PermissionTarget, RoleHandle,
};
use crate::policy::ClosePolicy;
use crate::state::{
    parse_ticket_channel, Reconciliation, TicketKind, TicketRecord, TicketRegistry,
};
use crate::store::TicketStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A ticket that was just opened, with the channel it lives in.
#[derive(Clone, Debug)]
pub struct OpenedTicket {
    pub record: TicketRecord,
    pub channel: ChannelHandle,
}

/// Opens and closes tickets. The registry lock is held for the whole of each
/// operation so numbering stays consistent under concurrent events.
pub struct TicketManager {
    platform: Arc<dyn ChatPlatform>,
    directory: Arc<Directory>,
    registry: Mutex<TicketRegistry>,
    store: TicketStore,
    catalog: Catalog,
    policy: ClosePolicy,
    access: TicketAccess,
}

impl TicketManager {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        directory: Arc<Directory>,
        registry: TicketRegistry,
        store: TicketStore,
        catalog: Catalog,
        policy: ClosePolicy,
        access: TicketAccess,
    ) -> Self {
        Self {
            platform,
            directory,
            registry: Mutex::new(registry),
            store,
            catalog,
            policy,
            access,
        }
    }

    pub async fn create_ticket(
        &self,
        kind: TicketKind,
        requester_id: u64,
        requester_mention: &str,
    ) -> Result<OpenedTicket, TicketError> {
        let mut registry = self.registry.lock().await;
        let category = self.directory.category().await?;

        let existing = self
            .platform
            .list_channels(&category, &kind.channel_prefix())
            .await?;
        let adopted = registry.adopt(existing.iter().map(|channel| channel.name.as_str()));
        for record in &adopted {
            log::info!("Adopted untracked ticket channel {}", record.channel_name());
        }

        let sequence_number = registry.next_sequence_number(kind);
        let channel_name = kind.channel_name(sequence_number);
        let support_role = self.directory.support_role().await?;
        let support_mention = self.directory.support_mention().await?;
        let permissions = self.ticket_permissions(requester_id, support_role.as_ref());

        let channel = match self
            .platform
            .create_channel(&category, &channel_name, &permissions)
            .await
        {
            Ok(channel) => channel,
            Err(err) => {
                self.directory.forget_category().await;
                if !adopted.is_empty() {
                    self.persist(&registry);
                }
                return Err(err.into());
            }
        };

        let welcome = self.catalog.render(
            MessageKey::Welcome,
            &[
                ("user", requester_mention),
                ("support", &support_mention),
                ("kind", kind.slug()),
            ],
        );
        if let Err(err) = self
            .platform
            .send_message(&channel, &welcome, &[ComponentAction::Close.button()])
            .await
        {
            log::warn!("Ticket {} has no welcome message: {}", channel_name, err);
        }

        let record = TicketRecord {
            kind,
            sequence_number,
            requester_id: Some(requester_id),
            requester_mention: Some(requester_mention.to_string()),
            support_mention: Some(support_mention),
        };
        registry.register(record.clone())?;
        self.persist(&registry);

        log::info!("Opened {} for user {}", channel_name, requester_id);
        Ok(OpenedTicket { record, channel })
    }

    /// Deletes a ticket channel after checking the channel name and the
    /// actor's rights. Returns the record that was tracked for it, if any.
    pub async fn close_ticket(
        &self,
        channel: &ChannelHandle,
        actor: &Actor,
    ) -> Result<Option<TicketRecord>, TicketError> {
        if parse_ticket_channel(&channel.name).is_none() {
            return Err(TicketError::NotATicketChannel(channel.name.clone()));
        }

        let mut registry = self.registry.lock().await;
        let support_role = self.directory.support_role().await?;
        if !self
            .policy
            .can_close(actor, support_role.as_ref(), registry.get(&channel.name))
        {
            log::info!("User {} may not close {}", actor.user_id, channel.name);
            return Err(TicketError::Denied(actor.user_id));
        }

        self.platform.delete_channel(channel).await?;
        let removed = registry.remove(&channel.name);
        self.persist(&registry);

        log::info!("Closed {} (by user {})", channel.name, actor.user_id);
        Ok(removed)
    }

    /// Drops the record of a channel that was deleted outside the bot.
    pub async fn forget_channel(&self, channel_name: &str) -> Option<TicketRecord> {
        let mut registry = self.registry.lock().await;
        let removed = registry.remove(channel_name)?;
        self.persist(&registry);
        log::info!("Ticket channel {} was deleted, record removed", channel_name);
        Some(removed)
    }

    /// Aligns the registry with the ticket channels present in the category.
    pub async fn reconcile(&self) -> Result<Reconciliation, PlatformError> {
        let mut registry = self.registry.lock().await;
        let category = self.directory.category().await?;
        let names: Vec<String> = self
            .platform
            .list_channels(&category, "")
            .await?
            .into_iter()
            .map(|channel| channel.name)
            .collect();

        let outcome = registry.reconcile(&names);
        for record in &outcome.dropped {
            log::info!("Dropped record of vanished channel {}", record.channel_name());
        }
        for record in &outcome.adopted {
            log::info!("Adopted untracked ticket channel {}", record.channel_name());
        }
        if !outcome.is_empty() {
            self.persist(&registry);
        }
        Ok(outcome)
    }

    pub async fn tickets(&self) -> Vec<TicketRecord> {
        self.registry.lock().await.all()
    }

    /// Rejection text shown to the user for a failed close.
    pub fn rejection(&self, err: &TicketError) -> Option<String> {
        match err {
            TicketError::NotATicketChannel(_) => {
                Some(self.catalog.render(MessageKey::NotATicketChannel, &[]))
            }
            TicketError::Denied(_) => Some(self.catalog.render(MessageKey::Denied, &[])),
            _ => None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn ticket_permissions(
        &self,
        requester_id: u64,
        support_role: Option<&RoleHandle>,
    ) -> Vec<PermissionRule> {
        use Grant::{Allow, Deny};

        let mut rules = match self.access {
            TicketAccess::Public => {
                vec![PermissionRule::new(PermissionTarget::Everyone, Allow, Allow)]
            }
            TicketAccess::Private => {
                let mut rules = vec![
                    PermissionRule::new(PermissionTarget::Everyone, Deny, Deny),
                    PermissionRule::new(PermissionTarget::Member(requester_id), Allow, Allow),
                ];
                if let Some(role) = support_role {
                    rules.push(PermissionRule::new(PermissionTarget::Role(role.id), Allow, Allow));
                }
                rules
            }
        };
        rules.push(PermissionRule::new(PermissionTarget::Bot, Allow, Allow));
        rules
    }

    fn persist(&self, registry: &TicketRegistry) {
        if let Err(err) = self.store.save(&registry.all()) {
            log::error!(
                "Failed to save tickets to {}: {}",
                self.store.path().display(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use std::sync::atomic::Ordering;
    use tempfile::{tempdir, TempDir};

    const CATEGORY: &str = "HELP Pipeline/Renderfarm";

    struct Harness {
        platform: Arc<FakePlatform>,
        manager: TicketManager,
        store: TicketStore,
        _dir: TempDir,
    }

    fn harness_with(
        platform: FakePlatform,
        access: TicketAccess,
        registry: TicketRegistry,
    ) -> Harness {
        let dir = tempdir().unwrap();
        harness_in(dir, "tickets.json", platform, access, registry)
    }

    fn harness_in(
        dir: TempDir,
        file: &str,
        platform: FakePlatform,
        access: TicketAccess,
        registry: TicketRegistry,
    ) -> Harness {
        let store = TicketStore::new(dir.path().join(file));
        let platform = Arc::new(platform);
        let directory = Arc::new(Directory::new(
            platform.clone(),
            CATEGORY,
            "Technical Director",
        ));
        let manager = TicketManager::new(
            platform.clone(),
            directory,
            registry,
            store.clone(),
            Catalog::default(),
            ClosePolicy::default(),
            access,
        );
        Harness {
            platform,
            manager,
            store,
            _dir: dir,
        }
    }

    fn harness() -> Harness {
        harness_with(
            FakePlatform::with_support_role("Technical Director"),
            TicketAccess::Public,
            TicketRegistry::new(),
        )
    }

    fn member(roles: &[u64]) -> Actor {
        Actor {
            user_id: 500,
            role_ids: roles.to_vec(),
            administrator: false,
        }
    }

    fn director() -> Actor {
        member(&[7])
    }

    #[tokio::test]
    async fn consecutive_tickets_get_consecutive_names() {
        let h = harness();
        let first = h
            .manager
            .create_ticket(TicketKind::Pipeline, 42, "<@42>")
            .await
            .unwrap();
        let second = h
            .manager
            .create_ticket(TicketKind::Pipeline, 43, "<@43>")
            .await
            .unwrap();

        assert_eq!(first.channel.name, "pipeline-ticket-001");
        assert_eq!(second.channel.name, "pipeline-ticket-002");
        assert_eq!(h.platform.categories.lock().unwrap().len(), 1);
        assert_eq!(h.store.load().len(), 2);
    }

    #[tokio::test]
    async fn welcome_message_mentions_requester_and_support() {
        let h = harness();
        let opened = h
            .manager
            .create_ticket(TicketKind::Farm, 42, "<@42>")
            .await
            .unwrap();

        let sent = h.platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel_id, opened.channel.id);
        assert!(sent[0].content.contains("<@42>"));
        assert!(sent[0].content.contains("<@&7>"));
        assert_eq!(sent[0].buttons, vec![ComponentAction::Close.button()]);
        assert_eq!(opened.record.support_mention.as_deref(), Some("<@&7>"));
    }

    #[tokio::test]
    async fn public_tickets_are_open_to_everyone() {
        let h = harness();
        h.manager
            .create_ticket(TicketKind::Farm, 42, "<@42>")
            .await
            .unwrap();
        let channel = h.platform.channel("farm-ticket-001").unwrap();
        assert_eq!(
            channel.permissions,
            vec![
                PermissionRule::new(PermissionTarget::Everyone, Grant::Allow, Grant::Allow),
                PermissionRule::new(PermissionTarget::Bot, Grant::Allow, Grant::Allow),
            ]
        );
    }

    #[tokio::test]
    async fn private_tickets_hide_the_channel_from_everyone_else() {
        let h = harness_with(
            FakePlatform::with_support_role("Technical Director"),
            TicketAccess::Private,
            TicketRegistry::new(),
        );
        h.manager
            .create_ticket(TicketKind::Farm, 42, "<@42>")
            .await
            .unwrap();
        let channel = h.platform.channel("farm-ticket-001").unwrap();
        assert_eq!(
            channel.permissions,
            vec![
                PermissionRule::new(PermissionTarget::Everyone, Grant::Deny, Grant::Deny),
                PermissionRule::new(PermissionTarget::Member(42), Grant::Allow, Grant::Allow),
                PermissionRule::new(PermissionTarget::Role(7), Grant::Allow, Grant::Allow),
                PermissionRule::new(PermissionTarget::Bot, Grant::Allow, Grant::Allow),
            ]
        );
    }

    #[tokio::test]
    async fn failed_welcome_still_opens_the_ticket() {
        let h = harness();
        h.platform.fail_sends.store(true, Ordering::SeqCst);
        let opened = h
            .manager
            .create_ticket(TicketKind::Pipeline, 42, "<@42>")
            .await
            .unwrap();
        assert_eq!(opened.channel.name, "pipeline-ticket-001");
        assert_eq!(h.manager.tickets().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_support_role_uses_plain_text_mention() {
        let h = harness_with(FakePlatform::new(), TicketAccess::Public, TicketRegistry::new());
        let opened = h
            .manager
            .create_ticket(TicketKind::Pipeline, 42, "<@42>")
            .await
            .unwrap();
        assert_eq!(
            opened.record.support_mention.as_deref(),
            Some("@Technical Director")
        );
    }

    #[tokio::test]
    async fn numbers_freed_by_closing_are_reused() {
        let h = harness();
        let mut opened = Vec::new();
        for user in 1..=3 {
            opened.push(
                h.manager
                    .create_ticket(TicketKind::Farm, user, &format!("<@{user}>"))
                    .await
                    .unwrap(),
            );
        }
        h.manager
            .close_ticket(&opened[1].channel, &director())
            .await
            .unwrap();

        let reopened = h
            .manager
            .create_ticket(TicketKind::Farm, 9, "<@9>")
            .await
            .unwrap();
        assert_eq!(reopened.channel.name, "farm-ticket-002");
    }

    #[tokio::test]
    async fn manually_created_ticket_channels_are_not_reused() {
        let h = harness();
        let category = h.platform.create_category(CATEGORY).await.unwrap();
        h.platform.add_channel(&category, "pipeline-ticket-001");

        let opened = h
            .manager
            .create_ticket(TicketKind::Pipeline, 42, "<@42>")
            .await
            .unwrap();
        assert_eq!(opened.channel.name, "pipeline-ticket-002");
        assert_eq!(h.manager.tickets().await.len(), 2);
    }

    #[tokio::test]
    async fn director_closes_ticket_and_record_is_removed() {
        let h = harness();
        let opened = h
            .manager
            .create_ticket(TicketKind::Pipeline, 42, "<@42>")
            .await
            .unwrap();

        let removed = h
            .manager
            .close_ticket(&opened.channel, &director())
            .await
            .unwrap();

        assert_eq!(removed, Some(opened.record));
        assert!(h.platform.channel("pipeline-ticket-001").is_none());
        assert!(h.manager.tickets().await.is_empty());
        assert!(h.store.load().is_empty());
    }

    #[tokio::test]
    async fn administrators_can_close() {
        let h = harness();
        let opened = h
            .manager
            .create_ticket(TicketKind::Farm, 42, "<@42>")
            .await
            .unwrap();
        let admin = Actor {
            administrator: true,
            ..member(&[])
        };
        assert!(h.manager.close_ticket(&opened.channel, &admin).await.is_ok());
    }

    #[tokio::test]
    async fn unauthorized_close_is_denied_without_side_effects() {
        let h = harness();
        let opened = h
            .manager
            .create_ticket(TicketKind::Farm, 42, "<@42>")
            .await
            .unwrap();

        let err = h
            .manager
            .close_ticket(&opened.channel, &member(&[3]))
            .await
            .unwrap_err();

        assert!(matches!(err, TicketError::Denied(500)));
        assert!(h.platform.channel("farm-ticket-001").is_some());
        assert!(h.platform.deleted.lock().unwrap().is_empty());
        assert_eq!(h.manager.tickets().await.len(), 1);
        assert!(h.manager.rejection(&err).unwrap().contains("permission"));
    }

    #[tokio::test]
    async fn closing_outside_a_ticket_channel_deletes_nothing() {
        let h = harness();
        let category = h.platform.create_category(CATEGORY).await.unwrap();
        let general = h.platform.add_channel(&category, "create-ticket");

        let err = h
            .manager
            .close_ticket(&general, &director())
            .await
            .unwrap_err();

        assert!(matches!(err, TicketError::NotATicketChannel(_)));
        assert!(h.platform.deleted.lock().unwrap().is_empty());
        assert!(h.manager.rejection(&err).unwrap().contains("ticket channels"));
    }

    #[tokio::test]
    async fn forget_channel_removes_record_once() {
        let h = harness();
        h.manager
            .create_ticket(TicketKind::Farm, 42, "<@42>")
            .await
            .unwrap();

        assert!(h.manager.forget_channel("farm-ticket-001").await.is_some());
        assert!(h.manager.forget_channel("farm-ticket-001").await.is_none());
        assert!(h.store.load().is_empty());
    }

    #[tokio::test]
    async fn reconcile_matches_registry_to_existing_channels() {
        let mut registry = TicketRegistry::new();
        registry.register(crate::state::record(TicketKind::Pipeline, 1)).unwrap();
        registry.register(crate::state::record(TicketKind::Pipeline, 4)).unwrap();
        let h = harness_with(
            FakePlatform::with_support_role("Technical Director"),
            TicketAccess::Public,
            registry,
        );
        let category = h.platform.create_category(CATEGORY).await.unwrap();
        h.platform.add_channel(&category, "create-ticket");
        h.platform.add_channel(&category, "pipeline-ticket-001");
        h.platform.add_channel(&category, "farm-ticket-002");

        let outcome = h.manager.reconcile().await.unwrap();

        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].channel_name(), "pipeline-ticket-004");
        assert_eq!(outcome.adopted.len(), 1);
        let names: Vec<String> = h
            .store
            .load()
            .iter()
            .map(TicketRecord::channel_name)
            .collect();
        assert_eq!(names, vec!["pipeline-ticket-001", "farm-ticket-002"]);
    }

    /// A harness whose tickets file cannot be written: its parent is a file.
    fn harness_with_broken_store() -> Harness {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("blocked"), "").unwrap();
        harness_in(
            dir,
            "blocked/tickets.json",
            FakePlatform::with_support_role("Technical Director"),
            TicketAccess::Public,
            TicketRegistry::new(),
        )
    }

    #[tokio::test]
    async fn failed_save_still_opens_and_closes_tickets() {
        let h = harness_with_broken_store();
        let opened = h
            .manager
            .create_ticket(TicketKind::Pipeline, 42, "<@42>")
            .await
            .unwrap();
        assert_eq!(opened.channel.name, "pipeline-ticket-001");
        assert_eq!(h.manager.tickets().await, vec![opened.record.clone()]);
        assert!(h.store.load().is_empty());

        let removed = h
            .manager
            .close_ticket(&opened.channel, &director())
            .await
            .unwrap();
        assert_eq!(removed, Some(opened.record));
        assert!(h.manager.tickets().await.is_empty());
        assert!(h.platform.channel("pipeline-ticket-001").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_get_distinct_numbers() {
        let h = harness();
        let manager = Arc::new(h.manager);

        let tasks: Vec<_> = (1..=8)
            .map(|user| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager
                        .create_ticket(TicketKind::Farm, user, &format!("<@{user}>"))
                        .await
                        .map(|opened| opened.channel.name)
                })
            })
            .collect();
        let mut names = Vec::new();
        for task in tasks {
            names.push(task.await.unwrap().unwrap());
        }
        names.sort();

        let expected: Vec<String> = (1..=8).map(|n| format!("farm-ticket-{n:03}")).collect();
        assert_eq!(names, expected);
        assert_eq!(h.platform.categories.lock().unwrap().len(), 1);
        assert_eq!(h.store.load().len(), 8);
    }
}
