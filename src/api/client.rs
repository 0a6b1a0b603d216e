use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::api::Backend;
use crate::api::models::{
    Contact, ContactUpdate, Conversation, ConversationDetail, Group, GroupUpdate, Message,
    NewContact, NewGroup, SendText, Stats,
};
use crate::error::{ConsoleError, Result};

pub struct ApiClient {
    pub http: HttpClient,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(&Self::base_api(base_url))
            .map_err(|e| ConsoleError::Validation(format!("Invalid server URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ConsoleError::Validation(format!("Invalid server URL: {base_url}")));
        }
        Ok(Self { http: HttpClient::new(), base })
    }

    fn base_api(base_url: &str) -> String {
        let trimmed = crate::utils::normalize_url(base_url);
        let trimmed = trimmed.trim_end_matches('/');
        if trimmed.ends_with("/api") { trimmed.to_string() } else { format!("{}/api", trimmed) }
    }

    /// `<base>/api/<segments...>`; each segment is percent-encoded so phones
    /// and group ids can never escape their path slot.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string));
        log::debug!("HTTP {} (detail: {:?})", status, detail);
        Err(ConsoleError::Http { status: status.as_u16(), detail })
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response> {
        log::trace!("{} {}", method, url);
        let mut req = self.http.request(method, url);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        Self::check(resp).await
    }

    async fn get_value(&self, segments: &[&str]) -> Result<Value> {
        let resp = self.request::<()>(Method::GET, self.endpoint(segments), None).await?;
        Ok(resp.json::<Value>().await?)
    }

    async fn get_list<T: DeserializeOwned>(&self, segments: &[&str], key: &str) -> Result<Vec<T>> {
        let json = self.get_value(segments).await?;
        Ok(serde_json::from_value(unwrap_list(json, key))?)
    }

    async fn send_for<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
        key: &str,
    ) -> Result<T> {
        let resp = self.request(method, self.endpoint(segments), Some(body)).await?;
        let json = resp.json::<Value>().await?;
        Ok(serde_json::from_value(unwrap_envelope(json, key))?)
    }

    async fn delete(&self, segments: &[&str]) -> Result<()> {
        self.request::<()>(Method::DELETE, self.endpoint(segments), None).await?;
        Ok(())
    }

    /// Reachability check used by the connect window; any HTTP answer counts.
    pub async fn ping(&self) -> Result<u16> {
        let resp = self.http.get(self.endpoint(&["stats"])).send().await?;
        Ok(resp.status().as_u16())
    }
}

/// Accepts a bare array or an object wrapping it under `key` or `data`.
fn unwrap_list(mut json: Value, key: &str) -> Value {
    if json.is_array() {
        return json;
    }
    for k in [key, "data"] {
        if json.get(k).is_some_and(Value::is_array) {
            return json[k].take();
        }
    }
    json
}

/// Create/update answer `{"ok": true, "contact": {...}}`; a bare object is
/// accepted as well.
fn unwrap_envelope(mut json: Value, key: &str) -> Value {
    if json.get(key).is_some_and(Value::is_object) {
        return json[key].take();
    }
    json
}

#[async_trait]
impl Backend for ApiClient {
    async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.get_list(&["conversations"], "conversations").await
    }

    async fn conversation(&self, phone: &str) -> Result<Vec<Message>> {
        let json = self.get_value(&["conversations", phone]).await?;
        let detail: ConversationDetail = serde_json::from_value(json)?;
        Ok(detail.messages)
    }

    async fn delete_conversation(&self, phone: &str) -> Result<()> {
        self.delete(&["conversations", phone]).await
    }

    async fn contacts(&self) -> Result<Vec<Contact>> {
        self.get_list(&["contacts"], "contacts").await
    }

    async fn contact(&self, phone: &str) -> Result<Contact> {
        let json = self.get_value(&["contacts", phone]).await?;
        Ok(serde_json::from_value(unwrap_envelope(json, "contact"))?)
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact> {
        self.send_for(Method::POST, &["contacts"], contact, "contact").await
    }

    async fn update_contact(&self, phone: &str, update: &ContactUpdate) -> Result<Contact> {
        self.send_for(Method::PUT, &["contacts", phone], update, "contact").await
    }

    async fn delete_contact(&self, phone: &str) -> Result<()> {
        self.delete(&["contacts", phone]).await
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        self.get_list(&["groups"], "groups").await
    }

    async fn group(&self, group_id: &str) -> Result<Group> {
        let json = self.get_value(&["groups", group_id]).await?;
        Ok(serde_json::from_value(unwrap_envelope(json, "group"))?)
    }

    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        self.send_for(Method::POST, &["groups"], group, "group").await
    }

    async fn update_group(&self, group_id: &str, update: &GroupUpdate) -> Result<Group> {
        self.send_for(Method::PUT, &["groups", group_id], update, "group").await
    }

    async fn delete_group(&self, group_id: &str) -> Result<()> {
        self.delete(&["groups", group_id]).await
    }

    async fn send_text(&self, payload: &SendText) -> Result<()> {
        self.request(Method::POST, self.endpoint(&["send", "text"]), Some(payload)).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let json = self.get_value(&["stats"]).await?;
        Ok(serde_json::from_value(json)?)
    }
}
