use chrono::NaiveDateTime;
use thiserror::Error;

/// What a single notification line says the user did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Join,
    Leave,
}

/// One join/leave notification, reduced to the fields the report needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceEvent {
    pub user_id: u64,
    pub kind: EventKind,
    pub channel_id: u64,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification does not start with a bold user mention: {0:?}")]
    MissingMention(String),

    #[error("unrecognized verb {0:?}, expected \"joined\" or \"left\"")]
    UnknownVerb(String),

    #[error("notification has no channel mention: {0:?}")]
    MissingChannel(String),

    #[error("invalid id {0:?}")]
    BadId(String),
}

/// Parses one logging-bot line of the shape
/// `**<@!111> joined voice channel <#222>` into a [`VoiceEvent`].
///
/// The verb token decides the kind: `joined` or `left`, nothing else.
/// `timestamp` is the creation time of the message the line came from.
pub fn parse_notification(
    text: &str,
    timestamp: NaiveDateTime,
) -> Result<VoiceEvent, NotificationError> {
    let rest = text
        .strip_prefix("**")
        .and_then(|t| t.strip_prefix("<@"))
        .ok_or_else(|| NotificationError::MissingMention(text.to_string()))?;
    // Nickname mentions carry an extra `!` after `<@`.
    let rest = rest.strip_prefix('!').unwrap_or(rest);
    let (user_id, rest) = rest
        .split_once('>')
        .ok_or_else(|| NotificationError::MissingMention(text.to_string()))?;
    let user_id = parse_id(user_id)?;

    let verb = rest.split_whitespace().next().unwrap_or("");
    let kind = match verb {
        "joined" => EventKind::Join,
        "left" => EventKind::Leave,
        other => return Err(NotificationError::UnknownVerb(other.to_string())),
    };

    let (_, rest) = rest
        .split_once("<#")
        .ok_or_else(|| NotificationError::MissingChannel(text.to_string()))?;
    let (channel_id, _) = rest
        .split_once('>')
        .ok_or_else(|| NotificationError::MissingChannel(text.to_string()))?;
    let channel_id = parse_id(channel_id)?;

    Ok(VoiceEvent {
        user_id,
        kind,
        channel_id,
        timestamp,
    })
}

fn parse_id(raw: &str) -> Result<u64, NotificationError> {
    raw.parse()
        .map_err(|_| NotificationError::BadId(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_join() {
        let event =
            parse_notification("**<@!100> joined voice channel <#200>", stamp()).unwrap();
        assert_eq!(event.user_id, 100);
        assert_eq!(event.kind, EventKind::Join);
        assert_eq!(event.channel_id, 200);
        assert_eq!(event.timestamp, stamp());
    }

    #[test]
    fn test_parse_leave() {
        let event = parse_notification("**<@!100> left voice channel <#200>", stamp()).unwrap();
        assert_eq!(event.kind, EventKind::Leave);
    }

    #[test]
    fn test_parse_mention_without_bang() {
        let event = parse_notification("**<@100> left voice channel <#200>", stamp()).unwrap();
        assert_eq!(event.user_id, 100);
        assert_eq!(event.kind, EventKind::Leave);
    }

    #[test]
    fn test_unknown_verb_is_rejected() {
        let err =
            parse_notification("**<@!100> muted themselves in <#200>", stamp()).unwrap_err();
        assert!(matches!(err, NotificationError::UnknownVerb(verb) if verb == "muted"));
    }

    #[test]
    fn test_missing_channel_mention_is_rejected() {
        let err = parse_notification("**<@!100> joined voice channel general", stamp())
            .unwrap_err();
        assert!(matches!(err, NotificationError::MissingChannel(_)));
    }

    #[test]
    fn test_plain_text_is_rejected() {
        let err = parse_notification("server maintenance at noon", stamp()).unwrap_err();
        assert!(matches!(err, NotificationError::MissingMention(_)));
    }

    #[test]
    fn test_non_numeric_user_id_is_rejected() {
        let err =
            parse_notification("**<@!nobody> joined voice channel <#200>", stamp()).unwrap_err();
        assert!(matches!(err, NotificationError::BadId(_)));
    }
}
