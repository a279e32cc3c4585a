use serenity::all::User;

pub fn get_user_name(user: &User) -> String {
    user.global_name.clone().unwrap_or(user.name.clone())
}

pub fn user_mention(id: u64) -> String {
    format!("<@{id}>")
}

pub fn role_mention(id: u64) -> String {
    format!("<@&{id}>")
}

pub fn channel_mention(id: u64) -> String {
    format!("<#{id}>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_use_discord_markup() {
        assert_eq!(user_mention(42), "<@42>");
        assert_eq!(role_mention(7), "<@&7>");
        assert_eq!(channel_mention(9), "<#9>");
    }
}
