use crate::error::PlatformError;
use crate::platform::{CategoryHandle, ChatPlatform, RoleHandle};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Name-keyed lookups of the guild objects the desk depends on, cached for
/// the lifetime of the session.
pub struct Directory {
    platform: Arc<dyn ChatPlatform>,
    category_name: String,
    support_role_name: String,
    category: Mutex<Option<CategoryHandle>>,
    support_role: Mutex<Option<RoleHandle>>,
}

impl Directory {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        category_name: impl Into<String>,
        support_role_name: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            category_name: category_name.into(),
            support_role_name: support_role_name.into(),
            category: Mutex::new(None),
            support_role: Mutex::new(None),
        }
    }

    /// Finds the ticket category, creating it when it does not exist.
    pub async fn category(&self) -> Result<CategoryHandle, PlatformError> {
        let mut cached = self.category.lock().await;
        if let Some(category) = cached.as_ref() {
            return Ok(category.clone());
        }

        let category = match self.platform.find_category(&self.category_name).await? {
            Some(category) => category,
            None => {
                log::info!("Creating category \"{}\"", self.category_name);
                self.platform.create_category(&self.category_name).await?
            }
        };
        log::debug!("Using category \"{}\" ({})", category.name, category.id);
        *cached = Some(category.clone());
        Ok(category)
    }

    /// Drops the cached category so the next call looks it up again.
    pub async fn forget_category(&self) {
        self.category.lock().await.take();
    }

    /// The support role, or `None` when the guild has no role of that name.
    pub async fn support_role(&self) -> Result<Option<RoleHandle>, PlatformError> {
        let mut cached = self.support_role.lock().await;
        if let Some(role) = cached.as_ref() {
            return Ok(Some(role.clone()));
        }

        let role = self.platform.find_role(&self.support_role_name).await?;
        match &role {
            Some(role) => {
                log::debug!("Resolved role \"{}\" to {}", role.name, role.id);
                *cached = Some(role.clone());
            }
            None => log::warn!("Role \"{}\" not found", self.support_role_name),
        }
        Ok(role)
    }

    /// Mention of the support role, falling back to plain text.
    pub async fn support_mention(&self) -> Result<String, PlatformError> {
        Ok(self
            .support_role()
            .await?
            .map(|role| role.mention)
            .unwrap_or_else(|| format!("@{}", self.support_role_name)))
    }
}
