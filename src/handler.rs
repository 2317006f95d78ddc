use anyhow::{Context as AnyhowContext, ensure};
use chrono::{Local, NaiveDateTime};
use serenity::all::{
    ChannelId, CreateAttachment, CreateMessage, GetMessages, GuildId, Message, MessageId, Ready,
    UserId,
};
use serenity::async_trait;
use serenity::prelude::*;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::notification::{self, VoiceEvent};
use crate::query::LogQuery;
use crate::report::build_report;

/// Milliseconds between the Unix epoch and the Discord snowflake epoch
/// (2015-01-01T00:00:00Z).
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Listens for report requests in the command channel and answers each
/// one with a rendered attendance file.
pub struct ReportHandler {
    config: Config,
}

impl ReportHandler {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Only messages posted in the command channel by a member holding
    /// the operator role count as requests.
    fn is_operator_request(&self, ctx: &Context, msg: &Message) -> bool {
        let Some(guild) = msg.guild(&ctx.cache) else {
            return false;
        };
        let in_command_channel = guild
            .channels
            .get(&msg.channel_id)
            .is_some_and(|channel| channel.name == self.config.command_channel);
        let has_role = guild
            .roles
            .values()
            .find(|role| role.name == self.config.allowed_role)
            .zip(msg.member.as_deref())
            .is_some_and(|(role, member)| member.roles.contains(&role.id));
        in_command_channel && has_role
    }

    /// Resolves the notification channel and the requested voice channel
    /// by name from the guild cache.
    fn locate_channels(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        query: &LogQuery,
    ) -> anyhow::Result<(ChannelId, ChannelId)> {
        let guild = ctx
            .cache
            .guild(guild_id)
            .context("guild missing from cache")?;
        let find = |name: &str| {
            guild
                .channels
                .values()
                .find(|channel| channel.name == name)
                .map(|channel| channel.id)
        };
        let log_channel = find(&self.config.log_channel)
            .with_context(|| format!("no channel named {:?}", self.config.log_channel))?;
        let voice_channel = find(&query.channel_name)
            .with_context(|| format!("no channel named {:?}", query.channel_name))?;
        Ok((log_channel, voice_channel))
    }

    async fn run_report(
        &self,
        ctx: &Context,
        msg: &Message,
        guild_id: GuildId,
    ) -> anyhow::Result<()> {
        let query = LogQuery::from_message(&msg.content)?;
        ensure!(
            query.date_start <= query.date_end,
            "window end {} precedes start {}",
            query.date_end,
            query.date_start
        );

        let (log_channel, voice_channel) = self.locate_channels(ctx, guild_id, &query)?;

        let messages = fetch_history(ctx, log_channel, query.start_utc(), query.end_utc())
            .await
            .context("failed to fetch message history")?;
        debug!(count = messages.len(), "fetched log messages");

        let mut events: Vec<VoiceEvent> = Vec::new();
        for message in &messages {
            if message.author.name != self.config.logging_bot {
                continue;
            }
            // The notification text lives in the embed description.
            let Some(text) = message
                .embeds
                .first()
                .and_then(|embed| embed.description.as_deref())
            else {
                continue;
            };
            match notification::parse_notification(text, message.timestamp.naive_utc()) {
                Ok(event) if event.channel_id == voice_channel.get() => events.push(event),
                Ok(_) => {}
                Err(err) => warn!(text, %err, "skipping unparsable notification"),
            }
        }

        let report = build_report(&events);
        info!(events = events.len(), sessions = report.len(), "report built");

        let mut body = String::new();
        for entry in &report {
            let member = guild_id
                .member(&ctx.http, UserId::new(entry.user_id))
                .await
                .with_context(|| format!("no member with id {}", entry.user_id))?;
            body.push_str(&entry.render(member.display_name()));
        }

        let filename = format!(
            "{}-{}.tsv",
            Local::now().format("%Y-%m-%dT%H:%M:%S"),
            query.channel_name
        );
        msg.channel_id
            .send_message(
                &ctx.http,
                CreateMessage::new().add_file(CreateAttachment::bytes(body.into_bytes(), filename)),
            )
            .await
            .context("failed to deliver report file")?;

        Ok(())
    }
}

#[async_trait]
impl EventHandler for ReportHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("logged on as {}", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        if !self.is_operator_request(&ctx, &msg) {
            return;
        }

        info!(author = %msg.author.name, content = %msg.content, "report requested");

        if let Err(err) = self.run_report(&ctx, &msg, guild_id).await {
            warn!("report failed: {err:#}");
            let _ = msg
                .channel_id
                .say(&ctx.http, format!("report failed: {err:#}"))
                .await;
        }
    }
}

/// Pulls the notification channel's messages inside `[since, until)`,
/// oldest first. Discord pages history by message id, so the window
/// start is first mapped onto the snowflake timeline.
async fn fetch_history(
    ctx: &Context,
    channel: ChannelId,
    since: NaiveDateTime,
    until: NaiveDateTime,
) -> serenity::Result<Vec<Message>> {
    let mut cursor = snowflake_before(since);
    let mut history = Vec::new();

    loop {
        let mut batch = channel
            .messages(&ctx.http, GetMessages::new().after(cursor).limit(100))
            .await?;
        if batch.is_empty() {
            break;
        }
        // Discord hands batches back newest first.
        batch.sort_unstable_by_key(|message| message.id);
        cursor = batch[batch.len() - 1].id;
        for message in batch {
            if message.timestamp.naive_utc() >= until {
                return Ok(history);
            }
            history.push(message);
        }
    }

    Ok(history)
}

/// The largest message id predating every message created at or after
/// `stamp`. Stamps before the snowflake epoch clamp to the smallest id.
fn snowflake_before(stamp: NaiveDateTime) -> MessageId {
    let since_epoch = (stamp.and_utc().timestamp_millis() - DISCORD_EPOCH_MS).max(1) as u64;
    MessageId::new((since_epoch << 22) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_snowflake_cursor_sits_just_below_window_start() {
        // One second past the snowflake epoch.
        let stamp = NaiveDate::from_ymd_opt(2015, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 1)
            .unwrap();
        assert_eq!(snowflake_before(stamp), MessageId::new((1000 << 22) - 1));
    }

    #[test]
    fn test_snowflake_cursor_clamps_before_epoch() {
        let stamp = NaiveDate::from_ymd_opt(2010, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(snowflake_before(stamp), MessageId::new((1 << 22) - 1));
    }
}
