use crate::error::PlatformError;
use async_trait::async_trait;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryHandle {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleHandle {
    pub id: u64,
    pub name: String,
    pub mention: String,
}

/// The user behind a button press or a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: u64,
    pub role_ids: Vec<u64>,
    pub administrator: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grant {
    Allow,
    Deny,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionTarget {
    Everyone,
    Bot,
    Member(u64),
    Role(u64),
}

/// One permission overwrite on a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermissionRule {
    pub target: PermissionTarget,
    pub view: Grant,
    pub send: Grant,
}

impl PermissionRule {
    pub fn new(target: PermissionTarget, view: Grant, send: Grant) -> Self {
        Self { target, view, send }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonStyle {
    Success,
    Secondary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub custom_id: &'static str,
    pub label: &'static str,
    pub emoji: &'static str,
    pub style: ButtonStyle,
}

/// The operations the ticket desk needs from the chat service, scoped to a
/// single guild.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn find_category(&self, name: &str) -> Result<Option<CategoryHandle>, PlatformError>;

    async fn create_category(&self, name: &str) -> Result<CategoryHandle, PlatformError>;

    /// Text channels inside `category` whose name starts with `prefix`.
    async fn list_channels(
        &self,
        category: &CategoryHandle,
        prefix: &str,
    ) -> Result<Vec<ChannelHandle>, PlatformError>;

    async fn create_channel(
        &self,
        category: &CategoryHandle,
        name: &str,
        permissions: &[PermissionRule],
    ) -> Result<ChannelHandle, PlatformError>;

    async fn delete_channel(&self, channel: &ChannelHandle) -> Result<(), PlatformError>;

    async fn send_message(
        &self,
        channel: &ChannelHandle,
        content: &str,
        buttons: &[Button],
    ) -> Result<(), PlatformError>;

    async fn has_messages(&self, channel: &ChannelHandle) -> Result<bool, PlatformError>;

    async fn find_role(&self, name: &str) -> Result<Option<RoleHandle>, PlatformError>;
}
