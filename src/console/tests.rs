use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use super::*;
use crate::api::models::{ContactUpdate, Direction, GroupUpdate, MessageKind, NewGroup};

#[derive(Default)]
struct Calls {
    conversations: usize,
    conversation: Vec<String>,
    contacts: usize,
    create_contact: Vec<String>,
    send_text: Vec<SendText>,
    delete_contact: Vec<String>,
}

/// In-memory relay. Failures are opt-in per endpoint.
#[derive(Default)]
struct FakeBackend {
    conversations: Vec<Conversation>,
    contacts: Vec<Contact>,
    messages: HashMap<String, Vec<Message>>,
    fail_conversations: Mutex<Option<u16>>,
    fail_messages: Option<u16>,
    message_delay: Option<Duration>,
    fail_send: bool,
    create_detail: Option<String>,
    reject_phones: HashSet<String>,
    calls: Mutex<Calls>,
}

fn http(status: u16, detail: Option<&str>) -> ConsoleError {
    ConsoleError::Http { status, detail: detail.map(str::to_string) }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.calls.lock().unwrap().conversations += 1;
        let failure = *self.fail_conversations.lock().unwrap();
        match failure {
            Some(status) => Err(http(status, None)),
            None => Ok(self.conversations.clone()),
        }
    }

    async fn conversation(&self, phone: &str) -> Result<Vec<Message>> {
        self.calls.lock().unwrap().conversation.push(phone.to_string());
        if let Some(delay) = self.message_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = self.fail_messages {
            return Err(http(status, None));
        }
        Ok(self.messages.get(phone).cloned().unwrap_or_default())
    }

    async fn delete_conversation(&self, _phone: &str) -> Result<()> {
        Ok(())
    }

    async fn contacts(&self) -> Result<Vec<Contact>> {
        self.calls.lock().unwrap().contacts += 1;
        Ok(self.contacts.clone())
    }

    async fn contact(&self, phone: &str) -> Result<Contact> {
        self.contacts
            .iter()
            .find(|c| c.phone == phone)
            .cloned()
            .ok_or_else(|| http(404, Some("Contact not found")))
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact> {
        self.calls.lock().unwrap().create_contact.push(contact.phone.clone());
        if let Some(detail) = &self.create_detail {
            return Err(http(400, Some(detail)));
        }
        if self.reject_phones.contains(&contact.phone) {
            return Err(http(500, None));
        }
        Ok(Contact {
            phone: contact.phone.clone(),
            name: contact.name.clone(),
            ..Default::default()
        })
    }

    async fn update_contact(&self, phone: &str, update: &ContactUpdate) -> Result<Contact> {
        Ok(Contact { phone: phone.to_string(), name: update.name.clone(), ..Default::default() })
    }

    async fn delete_contact(&self, phone: &str) -> Result<()> {
        self.calls.lock().unwrap().delete_contact.push(phone.to_string());
        Ok(())
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        Ok(Vec::new())
    }

    async fn group(&self, _group_id: &str) -> Result<Group> {
        Err(http(404, Some("Group not found")))
    }

    async fn create_group(&self, _group: &NewGroup) -> Result<Group> {
        Err(http(400, Some("Group already exists")))
    }

    async fn update_group(&self, _group_id: &str, _update: &GroupUpdate) -> Result<Group> {
        Err(http(404, None))
    }

    async fn delete_group(&self, _group_id: &str) -> Result<()> {
        Ok(())
    }

    async fn send_text(&self, payload: &SendText) -> Result<()> {
        self.calls.lock().unwrap().send_text.push(payload.clone());
        if self.fail_send {
            return Err(http(500, Some("WhatsApp API rejected the message")));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(Stats { total_messages: 3, incoming_messages: 2, outgoing_messages: 1 })
    }
}

type Harness = (Console<UnboundedSender<Update>>, UnboundedReceiver<Update>, Arc<FakeBackend>);

fn console(backend: FakeBackend) -> Harness {
    let backend = Arc::new(backend);
    let (tx, rx) = mpsc::unbounded_channel();
    let console = Console::new(backend.clone(), tx, Periods::default());
    (console, rx, backend)
}

fn drain(rx: &mut UnboundedReceiver<Update>) -> Vec<Update> {
    let mut out = Vec::new();
    while let Ok(u) = rx.try_recv() {
        out.push(u);
    }
    out
}

fn toasts(updates: &[Update]) -> Vec<&str> {
    updates
        .iter()
        .filter_map(|u| match u {
            Update::Toast(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

fn conv(phone: &str, name: &str) -> Conversation {
    Conversation {
        phone: phone.into(),
        name: Some(name.into()),
        last_message: None,
        last_timestamp: None,
        message_count: 1,
        unread_count: 0,
    }
}

fn msg(text: &str) -> Message {
    Message {
        id: None,
        direction: Direction::Incoming,
        kind: MessageKind::Text,
        text: Some(text.into()),
        timestamp: None,
        name: None,
    }
}

#[tokio::test]
async fn blank_message_never_reaches_the_network() {
    let (mut console, mut rx, backend) = console(FakeBackend::default());
    console.handle(Action::OpenChat("5511".into()));
    console.settle().await;
    drain(&mut rx);

    console.handle(Action::Send("   \n\t".into()));
    console.settle().await;

    assert!(backend.calls.lock().unwrap().send_text.is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn send_disables_composer_then_clears_and_refreshes() {
    let (mut console, mut rx, backend) = console(FakeBackend::default());
    console.handle(Action::OpenChat("5511".into()));
    console.settle().await;
    drain(&mut rx);
    let before = backend.calls.lock().unwrap().conversation.len();

    console.handle(Action::Send("  hello  ".into()));
    assert_eq!(drain(&mut rx), vec![Update::Composer { enabled: false, clear: false }]);
    console.settle().await;

    let updates = drain(&mut rx);
    assert!(updates.contains(&Update::Composer { enabled: true, clear: true }));
    assert!(updates.iter().any(|u| matches!(u, Update::Messages { silent: true, .. })));
    let calls = backend.calls.lock().unwrap();
    assert_eq!(calls.send_text, vec![SendText { to: "5511".into(), text: "hello".into() }]);
    assert_eq!(calls.conversation.len(), before + 1);
    assert_eq!(calls.conversations, 1);
}

#[tokio::test]
async fn failed_send_keeps_text_and_shows_detail() {
    let backend = FakeBackend { fail_send: true, ..Default::default() };
    let (mut console, mut rx, _backend) = console(backend);
    console.handle(Action::OpenChat("5511".into()));
    console.settle().await;
    drain(&mut rx);

    console.handle(Action::Send("hello".into()));
    console.settle().await;
    let updates = drain(&mut rx);
    assert!(updates.contains(&Update::Composer { enabled: true, clear: false }));
    assert_eq!(toasts(&updates), vec!["WhatsApp API rejected the message"]);
}

#[tokio::test]
async fn failed_contact_creation_keeps_the_editor_open() {
    let backend = FakeBackend { create_detail: Some("phone exists".into()), ..Default::default() };
    let (mut console, mut rx, _backend) = console(backend);
    console.handle(Action::EditContact(None));
    drain(&mut rx);

    let form = ContactForm { phone: "5511".into(), name: "Ana".into(), ..Default::default() };
    console.handle(Action::SaveContact(form));
    console.settle().await;

    let updates = drain(&mut rx);
    assert_eq!(toasts(&updates), vec!["phone exists"]);
    assert!(!updates.contains(&Update::ModalClosed));
    assert_eq!(console.store().modal(), Some(&Modal::ContactEditor(None)));
}

#[tokio::test]
async fn blank_phone_is_rejected_without_a_request() {
    let (mut console, mut rx, backend) = console(FakeBackend::default());
    console.handle(Action::EditContact(None));
    console.handle(Action::SaveContact(ContactForm::default()));
    console.settle().await;

    assert_eq!(toasts(&drain(&mut rx)), vec!["Phone is required"]);
    assert!(backend.calls.lock().unwrap().create_contact.is_empty());
}

#[tokio::test]
async fn successful_save_closes_editor_and_reloads_contacts() {
    let (mut console, mut rx, backend) = console(FakeBackend::default());
    console.handle(Action::EditContact(None));
    console.handle(Action::SaveContact(ContactForm { phone: "5511".into(), ..Default::default() }));
    console.settle().await;

    let updates = drain(&mut rx);
    assert!(updates.contains(&Update::ModalClosed));
    assert_eq!(console.store().modal(), None);
    assert_eq!(backend.calls.lock().unwrap().contacts, 1);
}

#[tokio::test]
async fn bulk_import_reports_partial_failure_and_reloads_once() {
    let backend = FakeBackend {
        reject_phones: ["553", "555"].iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    let (mut console, mut rx, backend) = console(backend);

    let csv: String = std::iter::once("phone,name\n".to_string())
        .chain((1..=7).map(|i| format!("55{i},Person {i}\n")))
        .collect();
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    std::io::Write::write_all(&mut file, csv.as_bytes()).unwrap();

    console.handle(Action::LoadImport(file.path().to_path_buf()));
    console.settle().await;
    let updates = drain(&mut rx);
    let preview = updates
        .iter()
        .find_map(|u| match u {
            Update::ImportPreview(p) => Some(p.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(preview.rows.len(), 5);
    assert_eq!(preview.remaining, 2);

    console.handle(Action::ConfirmImport);
    console.settle().await;

    let updates = drain(&mut rx);
    assert!(toasts(&updates).contains(&"Imported 5 contacts, 2 failed"));
    let calls = backend.calls.lock().unwrap();
    assert_eq!(calls.create_contact, vec!["551", "552", "553", "554", "555", "556", "557"]);
    assert_eq!(calls.contacts, 1);
    assert!(console.store().pending_import().is_empty());
}

#[tokio::test]
async fn switching_chats_keeps_one_poller_and_drops_stale_messages() {
    let mut backend = FakeBackend::default();
    backend.messages.insert("A".into(), vec![msg("from A")]);
    backend.messages.insert("B".into(), vec![msg("from B")]);
    let (mut console, mut rx, _backend) = console(backend);

    console.handle(Action::OpenChat("A".into()));
    console.handle(Action::OpenChat("B".into()));
    assert_eq!(console.scheduler.bound_chat(), Some("B"));
    console.settle().await;

    let shown: Vec<&str> = drain(&mut rx)
        .iter()
        .filter_map(|u| match u {
            Update::Messages { phone, .. } => Some(if phone == "A" { "A" } else { "B" }),
            _ => None,
        })
        .collect();
    assert_eq!(shown, vec!["B"]);
    assert_eq!(console.store().current_messages()[0].text.as_deref(), Some("from B"));
}

#[tokio::test]
async fn background_failures_are_silent_but_user_refresh_is_not() {
    let backend = FakeBackend { fail_conversations: Mutex::new(Some(500)), ..Default::default() };
    let (mut console, mut rx, _backend) = console(backend);

    console.on_tick(Tick::Conversations);
    console.settle().await;
    assert!(toasts(&drain(&mut rx)).is_empty());

    console.handle(Action::Refresh);
    console.settle().await;
    assert_eq!(toasts(&drain(&mut rx)), vec!["Failed to load conversations"]);
}

#[tokio::test]
async fn search_filters_the_active_tab() {
    let backend = FakeBackend {
        conversations: vec![conv("1", "Ana"), conv("2", "Bob")],
        ..Default::default()
    };
    let (mut console, mut rx, _backend) = console(backend);
    console.on_tick(Tick::Conversations);
    console.settle().await;
    drain(&mut rx);

    console.handle(Action::Search("bo".into()));
    match drain(&mut rx).as_slice() {
        [Update::Conversations(listing)] => {
            let keys: Vec<&str> = listing.rows().iter().map(|r| r.key.as_str()).collect();
            assert_eq!(keys, vec!["2"]);
        }
        other => panic!("unexpected updates: {other:?}"),
    }
}

#[tokio::test]
async fn leaving_chats_pauses_the_poller_and_returning_resumes_it() {
    let (mut console, _rx, _backend) = console(FakeBackend::default());
    console.handle(Action::OpenChat("A".into()));
    console.handle(Action::SwitchTab(Tab::Contacts));
    assert_eq!(console.scheduler.bound_chat(), None);
    assert_eq!(console.store().current_chat(), Some("A"));

    console.handle(Action::SwitchTab(Tab::Chats));
    assert_eq!(console.scheduler.bound_chat(), Some("A"));
    console.settle().await;
}

#[tokio::test]
async fn delete_requires_confirmation() {
    let backend = FakeBackend {
        contacts: vec![Contact {
            phone: "5511".into(),
            name: Some("Ana".into()),
            ..Default::default()
        }],
        ..Default::default()
    };
    let (mut console, mut rx, backend) = console(backend);
    console.handle(Action::SwitchTab(Tab::Contacts));
    console.settle().await;
    drain(&mut rx);

    console.handle(Action::RequestDelete(DeleteTarget::Contact("5511".into())));
    assert_eq!(drain(&mut rx), vec![Update::ConfirmDelete("Delete contact Ana (5511)?".into())]);
    console.handle(Action::CancelDelete);
    console.handle(Action::ConfirmDelete);
    console.settle().await;
    assert!(backend.calls.lock().unwrap().delete_contact.is_empty());

    console.handle(Action::RequestDelete(DeleteTarget::Contact("5511".into())));
    console.handle(Action::ConfirmDelete);
    console.settle().await;
    assert_eq!(backend.calls.lock().unwrap().delete_contact, vec!["5511"]);
    assert!(toasts(&drain(&mut rx)).contains(&"Deleted contact"));
}

#[tokio::test]
async fn deleting_the_open_conversation_closes_it() {
    let (mut console, mut rx, _backend) = console(FakeBackend::default());
    console.handle(Action::OpenChat("5511".into()));
    console.handle(Action::RequestDelete(DeleteTarget::Conversation("5511".into())));
    console.handle(Action::ConfirmDelete);
    console.settle().await;

    assert!(drain(&mut rx).contains(&Update::ChatClosed));
    assert_eq!(console.store().current_chat(), None);
    assert_eq!(console.scheduler.bound_chat(), None);
}

fn message_updates(updates: &[Update]) -> Vec<&Listing<MessageRow>> {
    updates
        .iter()
        .filter_map(|u| match u {
            Update::Messages { listing, .. } => Some(listing),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn composer_blocks_a_second_submission_while_sending() {
    let (mut console, _rx, backend) = console(FakeBackend::default());
    console.handle(Action::OpenChat("5511".into()));
    console.handle(Action::Send("first".into()));
    console.handle(Action::Send("second".into()));
    console.settle().await;

    let calls = backend.calls.lock().unwrap();
    assert_eq!(calls.send_text.len(), 1);
    assert_eq!(calls.send_text[0].text, "first");
}

#[tokio::test]
async fn opening_another_chat_mid_send_keeps_the_composer_locked() {
    let (mut console, mut rx, _backend) = console(FakeBackend::default());
    console.handle(Action::OpenChat("A".into()));
    console.handle(Action::Send("hello".into()));
    drain(&mut rx);

    console.handle(Action::OpenChat("B".into()));
    assert!(drain(&mut rx).contains(&Update::Composer { enabled: false, clear: true }));
    console.settle().await;
    assert!(drain(&mut rx).contains(&Update::Composer { enabled: true, clear: true }));
}

#[tokio::test]
async fn failed_poll_keeps_the_previous_snapshot() {
    let backend = FakeBackend {
        conversations: vec![conv("1", "Ana"), conv("2", "Bob")],
        ..Default::default()
    };
    let (mut console, mut rx, backend) = console(backend);
    console.on_tick(Tick::Conversations);
    console.settle().await;
    drain(&mut rx);

    *backend.fail_conversations.lock().unwrap() = Some(503);
    console.on_tick(Tick::Conversations);
    console.settle().await;

    let phones: Vec<&str> =
        console.store().conversations().iter().map(|c| c.phone.as_str()).collect();
    assert_eq!(phones, vec!["1", "2"]);
    let updates = drain(&mut rx);
    assert!(!updates.iter().any(|u| matches!(u, Update::Conversations(_))));
    assert!(toasts(&updates).is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_backend_still_delivers_messages() {
    let mut backend =
        FakeBackend { message_delay: Some(Duration::from_secs(5)), ..Default::default() };
    backend.messages.insert("A".into(), vec![msg("hi")]);
    let (mut console, mut rx, backend) = console(backend);

    console.handle(Action::OpenChat("A".into()));
    console.run_for(Duration::from_secs(12)).await;

    let updates = drain(&mut rx);
    assert!(message_updates(&updates).iter().any(|l| !l.rows().is_empty()));
    assert_eq!(console.store().current_messages()[0].text.as_deref(), Some("hi"));
    // Polls that land while a fetch is pending are skipped, not stacked.
    assert!(backend.calls.lock().unwrap().conversation.len() <= 3);
}

#[tokio::test(start_paused = true)]
async fn slow_user_fetch_failure_still_toasts() {
    let backend = FakeBackend {
        message_delay: Some(Duration::from_secs(5)),
        fail_messages: Some(500),
        ..Default::default()
    };
    let (mut console, mut rx, _backend) = console(backend);

    console.handle(Action::OpenChat("A".into()));
    console.run_for(Duration::from_millis(5500)).await;

    assert_eq!(toasts(&drain(&mut rx)), vec!["Failed to load messages"]);
}

#[tokio::test]
async fn overtaken_user_refresh_still_reports_its_failure() {
    let backend = FakeBackend { fail_conversations: Mutex::new(Some(500)), ..Default::default() };
    let (mut console, mut rx, _backend) = console(backend);

    console.handle(Action::Refresh);
    console.handle(Action::Refresh);
    console.settle().await;

    let updates = drain(&mut rx);
    let failures =
        toasts(&updates).iter().filter(|t| **t == "Failed to load conversations").count();
    assert_eq!(failures, 2);
}
