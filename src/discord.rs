use crate::error::PlatformError;
use crate::platform::{
    Actor, Button, ButtonStyle, CategoryHandle, ChannelHandle, ChatPlatform, Grant,
    PermissionRule, PermissionTarget, RoleHandle,
};
use crate::util::role_mention;
use async_trait::async_trait;
use serenity::all::{
    ButtonStyle as DiscordButtonStyle, ChannelId, ChannelType, CreateActionRow, CreateButton,
    CreateChannel, CreateMessage, GetMessages, GuildChannel, GuildId, Http, Member,
    PermissionOverwrite, PermissionOverwriteType, Permissions, ReactionType, RoleId, UserId,
};
use std::sync::Arc;

/// `ChatPlatform` backed by the Discord REST API, bound to one guild.
pub struct DiscordPlatform {
    http: Arc<Http>,
    guild_id: GuildId,
    bot_id: UserId,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, guild_id: GuildId, bot_id: UserId) -> Self {
        Self {
            http,
            guild_id,
            bot_id,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub async fn channel_handle(
        &self,
        channel_id: ChannelId,
    ) -> Result<ChannelHandle, PlatformError> {
        let channel = channel_id
            .to_channel(&*self.http)
            .await
            .map_err(PlatformError::transport)?
            .guild()
            .ok_or_else(|| PlatformError::NotFound(format!("guild channel {channel_id}")))?;
        Ok(ChannelHandle {
            id: channel.id.get(),
            name: channel.name,
        })
    }

    /// Fetches the member with their roles. Guild owners and members of a role
    /// with the administrator permission count as administrators.
    pub async fn resolve_actor(&self, user_id: UserId) -> Result<Actor, PlatformError> {
        let member = self
            .guild_id
            .member(&*self.http, user_id)
            .await
            .map_err(PlatformError::transport)?;
        let guild = self
            .guild_id
            .to_partial_guild(&*self.http)
            .await
            .map_err(PlatformError::transport)?;

        let administrator = guild.owner_id == user_id
            || has_administrator_role(self.guild_id, &member.roles, |id| {
                guild.roles.get(id).map(|role| role.permissions)
            });
        Ok(actor_from_member(&member, administrator))
    }

    async fn guild_channels(&self) -> Result<Vec<GuildChannel>, PlatformError> {
        let channels = self
            .guild_id
            .channels(&*self.http)
            .await
            .map_err(PlatformError::transport)?;
        Ok(channels.into_values().collect())
    }
}

/// Maps a rule onto a Discord overwrite. `@everyone` is the role whose id is
/// the guild id.
fn overwrite(rule: &PermissionRule, guild_id: GuildId, bot_id: UserId) -> PermissionOverwrite {
    let mut allow = Permissions::empty();
    let mut deny = Permissions::empty();
    for (grant, permission) in [
        (rule.view, Permissions::VIEW_CHANNEL),
        (rule.send, Permissions::SEND_MESSAGES),
    ] {
        match grant {
            Grant::Allow => allow |= permission,
            Grant::Deny => deny |= permission,
        }
    }

    let kind = match rule.target {
        PermissionTarget::Everyone => PermissionOverwriteType::Role(RoleId::new(guild_id.get())),
        PermissionTarget::Bot => PermissionOverwriteType::Member(bot_id),
        PermissionTarget::Member(id) => PermissionOverwriteType::Member(UserId::new(id)),
        PermissionTarget::Role(id) => PermissionOverwriteType::Role(RoleId::new(id)),
    };
    PermissionOverwrite { allow, deny, kind }
}

/// True when one of `roles`, or `@everyone`, carries the administrator bit.
fn has_administrator_role(
    guild_id: GuildId,
    roles: &[RoleId],
    permissions_of: impl Fn(&RoleId) -> Option<Permissions>,
) -> bool {
    let everyone = RoleId::new(guild_id.get());
    roles
        .iter()
        .chain(std::iter::once(&everyone))
        .filter_map(permissions_of)
        .any(|permissions| permissions.administrator())
}

/// Builds an actor from a guild member; `administrator` is decided by the caller.
pub fn actor_from_member(member: &Member, administrator: bool) -> Actor {
    Actor {
        user_id: member.user.id.get(),
        role_ids: member.roles.iter().map(|id| id.get()).collect(),
        administrator,
    }
}

fn discord_button(button: &Button) -> CreateButton {
    let style = match button.style {
        ButtonStyle::Success => DiscordButtonStyle::Success,
        ButtonStyle::Secondary => DiscordButtonStyle::Secondary,
        ButtonStyle::Danger => DiscordButtonStyle::Danger,
    };
    CreateButton::new(button.custom_id)
        .label(button.label)
        .emoji(ReactionType::Unicode(button.emoji.to_string()))
        .style(style)
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn find_category(&self, name: &str) -> Result<Option<CategoryHandle>, PlatformError> {
        Ok(self
            .guild_channels()
            .await?
            .into_iter()
            .find(|channel| channel.kind == ChannelType::Category && channel.name == name)
            .map(|channel| CategoryHandle {
                id: channel.id.get(),
                name: channel.name,
            }))
    }

    async fn create_category(&self, name: &str) -> Result<CategoryHandle, PlatformError> {
        let channel = self
            .guild_id
            .create_channel(&*self.http, CreateChannel::new(name).kind(ChannelType::Category))
            .await
            .map_err(PlatformError::transport)?;
        Ok(CategoryHandle {
            id: channel.id.get(),
            name: channel.name,
        })
    }

    async fn list_channels(
        &self,
        category: &CategoryHandle,
        prefix: &str,
    ) -> Result<Vec<ChannelHandle>, PlatformError> {
        let parent = ChannelId::new(category.id);
        Ok(self
            .guild_channels()
            .await?
            .into_iter()
            .filter(|channel| {
                channel.kind == ChannelType::Text
                    && channel.parent_id == Some(parent)
                    && channel.name.starts_with(prefix)
            })
            .map(|channel| ChannelHandle {
                id: channel.id.get(),
                name: channel.name,
            })
            .collect())
    }

    async fn create_channel(
        &self,
        category: &CategoryHandle,
        name: &str,
        permissions: &[PermissionRule],
    ) -> Result<ChannelHandle, PlatformError> {
        let overwrites: Vec<PermissionOverwrite> = permissions
            .iter()
            .map(|rule| overwrite(rule, self.guild_id, self.bot_id))
            .collect();
        let builder = CreateChannel::new(name)
            .kind(ChannelType::Text)
            .category(ChannelId::new(category.id))
            .permissions(overwrites);
        let channel = self
            .guild_id
            .create_channel(&*self.http, builder)
            .await
            .map_err(PlatformError::transport)?;
        Ok(ChannelHandle {
            id: channel.id.get(),
            name: channel.name,
        })
    }

    async fn delete_channel(&self, channel: &ChannelHandle) -> Result<(), PlatformError> {
        ChannelId::new(channel.id)
            .delete(&*self.http)
            .await
            .map_err(PlatformError::transport)?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel: &ChannelHandle,
        content: &str,
        buttons: &[Button],
    ) -> Result<(), PlatformError> {
        let mut message = CreateMessage::new().content(content);
        if !buttons.is_empty() {
            message = message.components(vec![CreateActionRow::Buttons(
                buttons.iter().map(discord_button).collect(),
            )]);
        }
        ChannelId::new(channel.id)
            .send_message(&*self.http, message)
            .await
            .map_err(PlatformError::transport)?;
        Ok(())
    }

    async fn has_messages(&self, channel: &ChannelHandle) -> Result<bool, PlatformError> {
        let messages = ChannelId::new(channel.id)
            .messages(&*self.http, GetMessages::new().limit(1))
            .await
            .map_err(PlatformError::transport)?;
        Ok(!messages.is_empty())
    }

    async fn find_role(&self, name: &str) -> Result<Option<RoleHandle>, PlatformError> {
        let roles = self
            .guild_id
            .roles(&*self.http)
            .await
            .map_err(PlatformError::transport)?;
        Ok(roles
            .into_values()
            .find(|role| role.name == name)
            .map(|role| RoleHandle {
                id: role.id.get(),
                mention: role_mention(role.id.get()),
                name: role.name,
            }))
    }
}
