use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Escape text for insertion into markup (Pango markup shares the XML
/// entity set with HTML). Every piece of user-controlled text goes through
/// here before it reaches a label.
pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Parse the relay's timestamps. Naive ISO strings (the relay stamps with its
/// local clock) are read in the local zone.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    // WhatsApp webhooks use epoch seconds.
    raw.parse::<i64>().ok().and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// "Just now", "5m ago", "3h ago", "2d ago", then a short date. Unparseable
/// input is returned as-is so the caller can still show something.
pub fn relative_time(raw: &str, now: DateTime<Utc>) -> String {
    let Some(ts) = parse_timestamp(raw) else {
        return raw.trim().to_string();
    };
    let secs = (now - ts).num_seconds();
    match secs {
        s if s < 60 => "Just now".to_string(),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s if s < 7 * 86_400 => format!("{}d ago", s / 86_400),
        _ => ts.with_timezone(&Local).format("%b %-d, %Y").to_string(),
    }
}

/// Clock time for a message bubble.
pub fn clock_time(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => ts.with_timezone(&Local).format("%H:%M").to_string(),
        None => raw.trim().to_string(),
    }
}
