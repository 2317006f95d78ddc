use anyhow::Context as _;

/// Deployment settings, read once at startup from the environment (a
/// local `.env` is loaded first when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    /// Text channel the bot accepts report requests in.
    pub command_channel: String,
    /// Text channel the join/leave notifications are posted to.
    pub log_channel: String,
    /// Account name of the bot authoring those notifications.
    pub logging_bot: String,
    /// Role a member must hold to request a report.
    pub allowed_role: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            token: required("DISCORD_TOKEN")?,
            command_channel: required("COMMAND_CHANNEL")?,
            log_channel: required("LOG_CHANNEL")?,
            logging_bot: required("LOGGING_BOT")?,
            allowed_role: required("ALLOWED_ROLE")?,
        })
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}
