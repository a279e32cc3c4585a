use crate::commands::{Command, ComponentAction};
use crate::config::Config;
use crate::directory::Directory;
use crate::discord::{actor_from_member, DiscordPlatform};
use crate::lifecycle::TicketManager;
use crate::messages::{Catalog, MessageKey};
use crate::panel::{PanelOutcome, PanelPresenter};
use crate::platform::Actor;
use crate::policy::ClosePolicy;
use crate::state::{TicketKind, TicketRegistry};
use crate::store::TicketStore;
use crate::util::{channel_mention, get_user_name, user_mention};
use async_trait::async_trait;
use colored::Colorize;
use serenity::all::{
    ChannelId, ChannelType, ComponentInteraction, Context, CreateInteractionResponseFollowup,
    EventHandler, GuildChannel, GuildId, Interaction, Message, Ready, User,
};
use std::sync::{Arc, OnceLock};

/// Everything needed to serve one guild, built once the gateway is ready.
pub struct Desk {
    platform: Arc<DiscordPlatform>,
    directory: Arc<Directory>,
    tickets: TicketManager,
    panel: PanelPresenter,
}

impl Desk {
    fn build(config: &Config, platform: Arc<DiscordPlatform>, registry: TicketRegistry) -> Self {
        let catalog = Catalog::new(config.locales.clone());
        let directory = Arc::new(Directory::new(
            platform.clone(),
            config.category_name.as_str(),
            config.support_role_name.as_str(),
        ));
        let tickets = TicketManager::new(
            platform.clone(),
            directory.clone(),
            registry,
            TicketStore::new(&config.tickets_path),
            catalog.clone(),
            ClosePolicy::new(config.allow_requester_close),
            config.ticket_access,
        );
        let panel = PanelPresenter::new(
            platform.clone(),
            directory.clone(),
            config.entry_channel_name.as_str(),
            config.support_email.as_str(),
            catalog,
        );
        Self {
            platform,
            directory,
            tickets,
            panel,
        }
    }

    fn failure(&self) -> String {
        self.tickets.catalog().render(MessageKey::Failed, &[])
    }

    /// Opens a ticket and returns the reply for the requester.
    async fn open(&self, kind: TicketKind, user: &User) -> String {
        let mention = user_mention(user.id.get());
        match self.tickets.create_ticket(kind, user.id.get(), &mention).await {
            Ok(opened) => {
                log::info!(
                    "{} opened {}",
                    get_user_name(user),
                    opened.record.channel_name()
                );
                self.tickets.catalog().render(
                    MessageKey::TicketCreated,
                    &[("channel", &channel_mention(opened.channel.id))],
                )
            }
            Err(err) => {
                log::error!(
                    "Failed to open a {} ticket for {}: {}",
                    kind,
                    get_user_name(user),
                    err
                );
                self.failure()
            }
        }
    }

    /// Closes the ticket in `channel_id`. Returns the text to show when the
    /// channel is still there afterwards.
    async fn close(&self, channel_id: ChannelId, actor: &Actor) -> Option<String> {
        let channel = match self.platform.channel_handle(channel_id).await {
            Ok(channel) => channel,
            Err(err) => {
                log::error!("Failed to resolve channel {}: {}", channel_id, err);
                return Some(self.failure());
            }
        };
        match self.tickets.close_ticket(&channel, actor).await {
            Ok(_) => None,
            Err(err) => self.tickets.rejection(&err).or_else(|| {
                log::error!("Failed to close {}: {}", channel.name, err);
                Some(self.failure())
            }),
        }
    }
}

pub struct Handler {
    config: Arc<Config>,
    store: TicketStore,
    desk: OnceLock<Arc<Desk>>,
}

impl Handler {
    pub fn new(config: Arc<Config>) -> Self {
        let store = TicketStore::new(&config.tickets_path);
        Self {
            config,
            store,
            desk: OnceLock::new(),
        }
    }

    /// The desk, if the bot is ready and the event belongs to its guild.
    fn desk_for(&self, guild_id: Option<GuildId>) -> Option<&Arc<Desk>> {
        let desk = self.desk.get()?;
        (guild_id == Some(desk.platform.guild_id())).then_some(desk)
    }

    async fn handle_component(&self, ctx: &Context, component: &ComponentInteraction) {
        let Some(action) = ComponentAction::from_custom_id(&component.data.custom_id) else {
            return;
        };
        let Some(desk) = self.desk_for(component.guild_id) else {
            log::warn!("Ignoring {:?} outside the ticket guild", action);
            return;
        };

        if let Err(err) = component.defer_ephemeral(&ctx.http).await {
            log::error!("Failed to acknowledge {:?}: {}", action, err);
            return;
        }

        let reply = match action {
            ComponentAction::Create(kind) => Some(desk.open(kind, &component.user).await),
            ComponentAction::Close => {
                let actor = match &component.member {
                    Some(member) => actor_from_member(
                        member,
                        member.permissions.is_some_and(|p| p.administrator()),
                    ),
                    None => {
                        log::warn!("Close pressed without member data");
                        return Self::follow_up(ctx, component, desk.failure()).await;
                    }
                };
                desk.close(component.channel_id, &actor).await
            }
        };

        if let Some(text) = reply {
            Self::follow_up(ctx, component, text).await;
        }
    }

    async fn follow_up(ctx: &Context, component: &ComponentInteraction, text: String) {
        let followup = CreateInteractionResponseFollowup::new()
            .content(text)
            .ephemeral(true);
        if let Err(err) = component.create_followup(&ctx.http, followup).await {
            log::error!("Failed to answer {}: {}", component.data.custom_id, err);
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let banner = format!("Logged in as {} (ID: {})", ready.user.name, ready.user.id);
        log::info!("{}", banner.green());

        if self.desk.get().is_some() {
            log::info!("Gateway session resumed");
            return;
        }

        let guild_id = match self
            .config
            .guild_id
            .map(GuildId::new)
            .or_else(|| ready.guilds.first().map(|guild| guild.id))
        {
            Some(guild_id) => guild_id,
            None => {
                log::error!("The bot is not a member of any guild");
                return;
            }
        };

        let records = self.store.load();
        log::info!("Loaded {} open tickets from {}", records.len(), self.store.path().display());

        let platform = Arc::new(DiscordPlatform::new(ctx.http.clone(), guild_id, ready.user.id));
        let desk = Arc::new(Desk::build(
            &self.config,
            platform,
            TicketRegistry::from_records(records),
        ));
        if self.desk.set(desk.clone()).is_err() {
            return;
        }

        match desk.panel.ensure_entry_point().await {
            Ok(PanelOutcome::Posted(channel)) => {
                log::info!("Posted ticket panel in #{}", channel.name)
            }
            Ok(PanelOutcome::AlreadyPresent(channel)) => {
                log::info!("Ticket panel already present in #{}", channel.name)
            }
            Err(err) => log::error!("Failed to set up the ticket panel: {}", err),
        }

        match desk.tickets.reconcile().await {
            Ok(outcome) if !outcome.is_empty() => log::info!(
                "Reconciled tickets: {} dropped, {} adopted",
                outcome.dropped.len(),
                outcome.adopted.len()
            ),
            Ok(_) => {}
            Err(err) => log::error!("Failed to reconcile tickets: {}", err),
        }
        log::info!("Tracking {} open tickets", desk.tickets.tickets().await.len());
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(component) = interaction {
            self.handle_component(&ctx, &component).await;
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(command) = Command::parse(&msg.content, &self.config.command_prefix) else {
            return;
        };
        let Some(desk) = self.desk_for(msg.guild_id) else {
            return;
        };

        let reply = match command {
            Command::Hello => Some(desk.tickets.catalog().render(MessageKey::Hello, &[])),
            Command::Close => match desk.platform.resolve_actor(msg.author.id).await {
                Ok(actor) => desk.close(msg.channel_id, &actor).await,
                Err(err) => {
                    log::error!("Failed to resolve {}: {}", get_user_name(&msg.author), err);
                    Some(desk.failure())
                }
            },
        };

        if let Some(text) = reply {
            if let Err(err) = msg.channel_id.say(&ctx.http, text).await {
                log::error!("Failed to reply in {}: {}", msg.channel_id, err);
            }
        }
    }

    async fn channel_delete(
        &self,
        _ctx: Context,
        channel: GuildChannel,
        _messages: Option<Vec<Message>>,
    ) {
        let Some(desk) = self.desk_for(Some(channel.guild_id)) else {
            return;
        };
        if channel.kind == ChannelType::Category {
            desk.directory.forget_category().await;
        } else {
            desk.tickets.forget_channel(&channel.name).await;
        }
    }
}
