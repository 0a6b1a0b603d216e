//! Projection of store contents into Pango markup rows.
//!
//! Everything here is pure: the same collection and filter always give the
//! same rows, in the order the backend sent them.

use chrono::{DateTime, Utc};

use crate::api::models::{Contact, Conversation, Direction, Group, Message, Stats};
use crate::format::{clock_time, escape_markup, relative_time};

/// How close (in pixels) to the bottom a chat must be to stay pinned there
/// on a background refresh.
pub const PIN_TOLERANCE_PX: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Identity of the entity behind the row (phone or group id).
    pub key: String,
    pub markup: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub outgoing: bool,
    pub markup: String,
}

/// Either rows to show, or the placeholder for an empty list.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing<R> {
    Rows(Vec<R>),
    Empty(String),
}

impl<R> Listing<R> {
    pub fn rows(&self) -> &[R] {
        match self {
            Self::Rows(rows) => rows,
            Self::Empty(_) => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }
}

/// Case-insensitive substring match against any of `fields`. An empty (or
/// blank) filter matches everything.
pub fn matches_filter(filter: &str, fields: &[&str]) -> bool {
    let needle = filter.trim().to_lowercase();
    needle.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&needle))
}

fn listing<T, R>(
    items: &[T],
    filter: &str,
    fields: impl Fn(&T) -> Vec<&str>,
    row: impl Fn(&T) -> R,
    nothing_yet: &str,
) -> Listing<R> {
    if items.is_empty() {
        return Listing::Empty(nothing_yet.to_string());
    }
    let rows: Vec<R> = items
        .iter()
        .filter(|item| matches_filter(filter, &fields(*item)))
        .map(row)
        .collect();
    if rows.is_empty() {
        Listing::Empty(format!("No matches for \u{201c}{}\u{201d}", escape_markup(filter.trim())))
    } else {
        Listing::Rows(rows)
    }
}

pub fn conversations(list: &[Conversation], filter: &str, now: DateTime<Utc>) -> Listing<Row> {
    listing(
        list,
        filter,
        |c| vec![c.display_name(), c.phone.as_str()],
        |c| {
            let when = c
                .last_timestamp
                .as_deref()
                .map(|t| relative_time(t, now))
                .unwrap_or_default();
            let preview = c.last_message.as_deref().unwrap_or("");
            let mut markup = format!(
                "<b>{}</b>  <small>{}</small>\n<small>{}</small>",
                escape_markup(c.display_name()),
                escape_markup(&when),
                escape_markup(preview),
            );
            if c.unread_count > 0 {
                markup.push_str(&format!("  <b><small>({})</small></b>", c.unread_count));
            }
            Row { key: c.phone.clone(), markup }
        },
        "No conversations yet",
    )
}

pub fn contacts(list: &[Contact], filter: &str) -> Listing<Row> {
    listing(
        list,
        filter,
        |c| vec![c.name.as_deref().unwrap_or(""), c.phone.as_str()],
        |c| {
            let mut markup = format!("<b>{}</b>", escape_markup(c.display_name()));
            if c.is_business {
                markup.push_str("  <small><i>business</i></small>");
            }
            markup.push_str(&format!("\n<small>{}</small>", escape_markup(&c.phone)));
            if !c.labels.is_empty() {
                let labels = escape_markup(&c.labels.join(", "));
                markup.push_str(&format!("  <small>[{}]</small>", labels));
            }
            if let Some(notes) = c.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                markup.push_str(&format!("\n<small><i>{}</i></small>", escape_markup(notes)));
            }
            Row { key: c.phone.clone(), markup }
        },
        "No contacts yet",
    )
}

pub fn groups(list: &[Group], filter: &str) -> Listing<Row> {
    listing(
        list,
        filter,
        |g| vec![g.name.as_str()],
        |g| {
            let name = if g.name.trim().is_empty() { &g.group_id } else { &g.name };
            let mut markup = format!("<b>{}</b>", escape_markup(name));
            if !g.is_active {
                markup.push_str("  <small><i>inactive</i></small>");
            }
            let members = if g.participant_count == 1 { "member" } else { "members" };
            markup.push_str(&format!("\n<small>{} {}</small>", g.participant_count, members));
            if let Some(desc) = g.description.as_deref().filter(|d| !d.trim().is_empty()) {
                markup.push_str(&format!("\n<small><i>{}</i></small>", escape_markup(desc)));
            }
            Row { key: g.group_id.clone(), markup }
        },
        "No groups yet",
    )
}

pub fn messages(list: &[Message]) -> Listing<MessageRow> {
    if list.is_empty() {
        return Listing::Empty("No messages yet".to_string());
    }
    Listing::Rows(list.iter().map(message).collect())
}

fn message(m: &Message) -> MessageRow {
    let mut markup = String::new();
    if let Some(label) = m.kind.label() {
        markup.push_str(&format!("<small><i>[{}]</i></small>", escape_markup(label)));
    }
    if let Some(text) = m.text.as_deref().filter(|t| !t.is_empty()) {
        if !markup.is_empty() {
            markup.push('\n');
        }
        markup.push_str(&escape_markup(text));
    }
    if let Some(ts) = m.timestamp.as_deref().filter(|t| !t.trim().is_empty()) {
        markup.push_str(&format!("\n<small>{}</small>", escape_markup(&clock_time(ts))));
    }
    MessageRow { outgoing: m.direction == Direction::Outgoing, markup }
}

pub fn stats(stats: &Stats) -> String {
    format!(
        "{} messages \u{b7} {} in \u{b7} {} out",
        stats.total_messages, stats.incoming_messages, stats.outgoing_messages
    )
}

/// Scroll state of the chat view just before new messages are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    pub value: f64,
    pub upper: f64,
    pub page_size: f64,
}

impl ScrollPosition {
    pub fn near_bottom(&self) -> bool {
        self.upper - (self.value + self.page_size) <= PIN_TOLERANCE_PX
    }
}

/// Whether the chat view should jump to the newest message after an update.
/// User-visible refreshes always do; silent ones only if the reader was
/// already at the bottom.
pub fn stick_to_bottom(before: ScrollPosition, silent: bool) -> bool {
    !silent || before.near_bottom()
}
