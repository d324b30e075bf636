use crate::types::Message;
use chrono::{Local, NaiveDate, TimeZone};

/// Row of the rendered thread: either a centered date chip or a message
/// bubble. Derivation only — the stored message order is never touched.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadItem {
    DateChip(String),
    Entry(Message),
}

/// Local calendar day of an epoch-second timestamp.
pub fn local_day(epoch: i64) -> Option<NaiveDate> {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|dt| dt.date_naive())
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Chip text by day distance: Today, Yesterday, the weekday name inside a
/// week, a full date beyond that.
pub fn chip_label(day: NaiveDate, today: NaiveDate) -> String {
    let diff = (today - day).num_days();
    if diff == 0 {
        "Today".to_string()
    } else if diff == 1 {
        "Yesterday".to_string()
    } else if diff < 7 {
        day.format("%A").to_string()
    } else {
        day.format("%d/%m/%Y").to_string()
    }
}

/// Interleave date chips into a thread: one chip before the first message of
/// each new calendar day, derived from `timestamps.whatsapp`. Consecutive
/// same-day messages never get one.
pub fn thread_items(messages: &[Message], today: NaiveDate) -> Vec<ThreadItem> {
    let mut items = Vec::with_capacity(messages.len());
    let mut last_day: Option<NaiveDate> = None;
    for message in messages {
        if let Some(day) = local_day(message.timestamps.whatsapp) {
            if last_day != Some(day) {
                last_day = Some(day);
                items.push(ThreadItem::DateChip(chip_label(day, today)));
            }
        }
        items.push(ThreadItem::Entry(message.clone()));
    }
    items
}

/// HH:MM clock shown beside each bubble and list row.
pub fn format_clock(epoch: i64) -> String {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}
