use serde::{Deserialize, Deserializer, Serialize};

// The backend sends `null` for lists and counters it never filled in.
fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Conversation {
    pub phone: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_timestamp: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub message_count: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub unread_count: u64,
}

impl Conversation {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(n) if !n.trim().is_empty() => n,
            _ => &self.phone,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Contact {
    pub phone: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub groups: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub is_business: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub business_description: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
}

impl Contact {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(n) if !n.trim().is_empty() => n,
            _ => &self.phone,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Group {
    pub group_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub participant_count: u64,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub participants: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub admins: Vec<String>,
    #[serde(default)]
    pub group_invite_link: Option<String>,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// WhatsApp message type. Outgoing messages stored by the relay carry no
/// type at all, which counts as plain text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessageKind {
    #[default]
    Text,
    Media(String),
    Other(String),
}

impl MessageKind {
    pub fn from_type(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Text,
            Some(t) if t.eq_ignore_ascii_case("text") => Self::Text,
            Some(t) => {
                let lower = t.to_ascii_lowercase();
                match lower.as_str() {
                    "image" | "video" | "audio" | "document" | "sticker" => Self::Media(lower),
                    _ => Self::Other(lower),
                }
            }
        }
    }

    /// Label shown next to non-text messages.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Text => None,
            Self::Media(t) | Self::Other(t) => Some(t),
        }
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(Self::from_type(raw.as_deref()))
    }
}

impl Serialize for MessageKind {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.label().unwrap_or("text"))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    #[serde(default)]
    pub id: Option<String>,
    pub direction: Direction,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationDetail {
    #[serde(default, deserialize_with = "null_default")]
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    #[serde(default, deserialize_with = "null_default")]
    pub total_messages: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub incoming_messages: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub outgoing_messages: u64,
}

#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct NewContact {
    pub phone: String,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub labels: Vec<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub labels: Vec<String>,
    pub groups: Vec<String>,
    pub is_business: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct NewGroup {
    pub group_id: String,
    pub name: String,
    pub description: Option<String>,
    pub participants: Vec<String>,
    pub admins: Vec<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct GroupUpdate {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SendText {
    pub to: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn relay_message_without_type_is_text() {
        let json = r#"{"id":"wamid.1","from":"bot","to":"5511","text":"hi","direction":"outgoing","timestamp":"2024-05-01T10:00:00"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.direction, Direction::Outgoing);
    }

    #[test]
    fn media_and_other_types_keep_their_label() {
        let img: Message =
            serde_json::from_str(r#"{"direction":"incoming","type":"IMAGE","text":null}"#).unwrap();
        assert_eq!(img.kind, MessageKind::Media("image".into()));
        assert_eq!(img.kind.label(), Some("image"));
        let loc: Message =
            serde_json::from_str(r#"{"direction":"incoming","type":"location"}"#).unwrap();
        assert_eq!(loc.kind, MessageKind::Other("location".into()));
    }

    #[test]
    fn contact_nulls_decode_as_empty() {
        let json = r#"{"id":3,"phone":"5511","name":null,"labels":null,"groups":["vip"],"is_business":null,"notes":null}"#;
        let c: Contact = serde_json::from_str(json).unwrap();
        assert!(c.labels.is_empty());
        assert_eq!(c.groups, vec!["vip".to_string()]);
        assert!(!c.is_business);
        assert_eq!(c.display_name(), "5511");
    }

    #[test]
    fn conversation_without_name_shows_phone() {
        let json = r#"{"phone":"5511","name":null,"last_message":"yo","last_timestamp":"","unread_count":0,"message_count":4}"#;
        let c: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(c.display_name(), "5511");
        assert_eq!(c.message_count, 4);
    }
}
