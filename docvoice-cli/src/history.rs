use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use docvoice_session::{CallStore, preview};
use std::fmt::Display;

/// Minute-resolution timestamp in `tz`.
fn stamp<Tz: TimeZone>(at: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    at.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string()
}

pub async fn print(store: &dyn CallStore, limit: usize) -> Result<()> {
    let recordings = store.recent_recordings(limit).await?;
    println!("Recent calls ({}):", recordings.len());
    for record in &recordings {
        let opening = record.transcript().first().map(|m| preview(&m.text)).unwrap_or_default();
        println!(
            "  {}  {:>6.1}s  {}  {}",
            stamp(record.started_at(), &Local),
            record.duration_secs(),
            record.audio_url(),
            opening
        );
    }

    let chats = store.recent_chat_sessions(limit).await?;
    println!("Recent chats ({}):", chats.len());
    for session in &chats {
        println!(
            "  {}  {:>3} messages  {}",
            stamp(session.updated_at, &Local),
            session.messages.len(),
            session.last_message
        );
    }
    Ok(())
}
