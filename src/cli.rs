//! CLI interface for the chat client
//!
//! Provides command parsing, async stdin reading for concurrent I/O with the
//! connection event stream, and the thread/list rendering helpers.

use chrono::{DateTime, Datelike, Local, Utc};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;
use crate::models::{Conversation, Message, MessageStatus};

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/chats` - print the conversation list
    Chats,
    /// `/open <n|id>` - select a conversation
    Open(String),
    /// `/new <userId>` - start a conversation with a user
    New(String),
    /// `/older` - load the next older page
    Older,
    /// `/read` - dismiss the new-messages indicator / mark read
    Read,
    /// `/quit` - exit
    Quit,
    /// Anything else - send as a message
    Message(String),
}

impl Command {
    pub fn parse(input: &str) -> std::result::Result<Command, String> {
        let trimmed = input.trim();
        if !trimmed.starts_with('/') {
            return Ok(Command::Message(trimmed.to_string()));
        }
        let mut parts = trimmed.splitn(2, ' ');
        let keyword = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();
        match keyword {
            "/chats" => Ok(Command::Chats),
            "/open" if !arg.is_empty() => Ok(Command::Open(arg.to_string())),
            "/new" if !arg.is_empty() => Ok(Command::New(arg.to_string())),
            "/older" => Ok(Command::Older),
            "/read" => Ok(Command::Read),
            "/quit" | "/exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

/// "Today", "Yesterday", a weekday for the current week, else dd.mm.yyyy.
pub fn format_message_day(sent_at: DateTime<Utc>, now: DateTime<Local>) -> String {
    let local = sent_at.with_timezone(&now.timezone());
    let day_diff = (now.date_naive() - local.date_naive()).num_days();

    if day_diff == 0 {
        return "Today".to_string();
    }
    if day_diff == 1 {
        return "Yesterday".to_string();
    }

    let days_into_week = i64::from(now.date_naive().weekday().num_days_from_monday());
    if day_diff <= days_into_week {
        return local.format("%A").to_string();
    }

    local.format("%d.%m.%Y").to_string()
}

/// "HH:MM" in local time.
pub fn format_message_time(sent_at: DateTime<Utc>) -> String {
    sent_at.with_timezone(&Local).format("%H:%M").to_string()
}

/// Timestamp for the conversation list: day label plus time.
pub fn format_chat_timestamp(sent_at: DateTime<Utc>, now: DateTime<Local>) -> String {
    let day = format_message_day(sent_at, now);
    let time = sent_at.with_timezone(&now.timezone()).format("%H:%M");
    format!("{} {}", day, time)
}

/// Status/time suffix for a message bubble.
pub fn message_meta(message: &Message) -> String {
    match message.status {
        MessageStatus::Sending => "Sending...".to_string(),
        MessageStatus::Pending => "Pending".to_string(),
        MessageStatus::Failed => {
            if message.error_message.is_empty() {
                "Failed".to_string()
            } else {
                format!("Failed: {}", message.error_message)
            }
        }
        MessageStatus::Sent => format_message_time(message.sent_at),
    }
}

/// Render a thread as lines, with day dividers between calendar days.
pub fn render_thread(messages: &[Message], current_user_id: &str) -> Vec<String> {
    let now = Local::now();
    let mut lines = Vec::new();
    let mut last_day = String::new();
    for message in messages {
        let day = format_message_day(message.sent_at, now);
        if day != last_day {
            lines.push(format!("--- {} ---", day));
            last_day = day;
        }
        let marker = if message.sender_id == current_user_id {
            ">"
        } else {
            "<"
        };
        lines.push(format!(
            "{} {} [{}]",
            marker,
            message.content,
            message_meta(message)
        ));
    }
    lines
}

/// Render one conversation-list row.
pub fn render_chat_row(index: usize, chat: &Conversation, unread: bool) -> String {
    let now = Local::now();
    let marker = if unread { "*" } else { " " };
    let timestamp = chat
        .last_message_at
        .map(|at| format_chat_timestamp(at, now))
        .unwrap_or_default();
    let preview = chat.last_message_preview.as_deref().unwrap_or("");
    format!(
        "{}{:>3}. {} {} | {}",
        marker,
        index + 1,
        chat.other_name(),
        timestamp,
        preview
    )
}

/// Async stdin reader that yields one line at a time
///
/// Uses tokio's async stdin to enable concurrent I/O with connection events.
/// Prints the prompt and flushes stdout before blocking on input.
pub async fn read_line_async(reader: &mut BufReader<tokio::io::Stdin>) -> Result<Option<String>> {
    use std::io::stdout;

    print!("> ");
    stdout().flush()?;

    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => Ok(None), // EOF
        Ok(_) => {
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            Ok(Some(line))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_open_command() {
        let result = Command::parse("/open 2");
        assert_eq!(result, Ok(Command::Open("2".to_string())));
    }

    #[test]
    fn test_parse_chats_command() {
        assert_eq!(Command::parse("/chats"), Ok(Command::Chats));
    }

    #[test]
    fn test_parse_regular_message() {
        let result = Command::parse("Hello world");
        assert_eq!(result, Ok(Command::Message("Hello world".to_string())));
    }

    #[test]
    fn test_parse_invalid_command() {
        assert!(Command::parse("/unknown").is_err());
    }

    #[test]
    fn test_open_requires_argument() {
        assert!(Command::parse("/open").is_err());
    }

    #[test]
    fn test_day_label_today_and_yesterday() {
        let now = Local.with_ymd_and_hms(2026, 3, 4, 15, 0, 0).unwrap();
        let today = now.with_timezone(&Utc);
        let yesterday = today - chrono::Duration::days(1);

        assert_eq!(format_message_day(today, now), "Today");
        assert_eq!(format_message_day(yesterday, now), "Yesterday");
    }

    #[test]
    fn test_day_label_older_dates_use_numeric_format() {
        let now = Local.with_ymd_and_hms(2026, 3, 4, 15, 0, 0).unwrap();
        let old = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
        let label = format_message_day(old, now);
        assert!(label.contains("2026"));
        assert!(label.contains('.'));
    }

    #[test]
    fn test_message_meta_reflects_status() {
        let mut msg = Message::optimistic("u1".to_string(), "hi".to_string(), true);
        assert_eq!(message_meta(&msg), "Sending...");

        msg.status = MessageStatus::Pending;
        assert_eq!(message_meta(&msg), "Pending");

        msg.status = MessageStatus::Failed;
        msg.error_message = "too long".to_string();
        assert_eq!(message_meta(&msg), "Failed: too long");
    }

    #[test]
    fn test_render_thread_inserts_day_dividers() {
        let mut first = Message::optimistic("u1".to_string(), "old".to_string(), true);
        first.sent_at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        first.status = MessageStatus::Sent;
        let mut second = Message::optimistic("u2".to_string(), "new".to_string(), true);
        second.sent_at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        second.status = MessageStatus::Sent;

        let lines = render_thread(&[first, second], "u1");
        let dividers = lines.iter().filter(|l| l.starts_with("---")).count();
        assert_eq!(dividers, 2);
        assert!(lines.iter().any(|l| l.starts_with("> old")));
        assert!(lines.iter().any(|l| l.starts_with("< new")));
    }
}
