pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::error::Result;
use models::{
    Contact, ContactUpdate, Conversation, Group, GroupUpdate, Message, NewContact, NewGroup,
    SendText, Stats,
};

/// The console's view of the WhatsApp relay backend.
///
/// [`client::ApiClient`] talks HTTP; the controller only sees this trait so
/// it can be driven by an in-memory backend in tests.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn conversations(&self) -> Result<Vec<Conversation>>;
    async fn conversation(&self, phone: &str) -> Result<Vec<Message>>;
    async fn delete_conversation(&self, phone: &str) -> Result<()>;

    async fn contacts(&self) -> Result<Vec<Contact>>;
    async fn contact(&self, phone: &str) -> Result<Contact>;
    async fn create_contact(&self, contact: &NewContact) -> Result<Contact>;
    async fn update_contact(&self, phone: &str, update: &ContactUpdate) -> Result<Contact>;
    async fn delete_contact(&self, phone: &str) -> Result<()>;

    async fn groups(&self) -> Result<Vec<Group>>;
    async fn group(&self, group_id: &str) -> Result<Group>;
    async fn create_group(&self, group: &NewGroup) -> Result<Group>;
    async fn update_group(&self, group_id: &str, update: &GroupUpdate) -> Result<Group>;
    async fn delete_group(&self, group_id: &str) -> Result<()>;

    async fn send_text(&self, payload: &SendText) -> Result<()>;
    async fn stats(&self) -> Result<Stats>;
}
