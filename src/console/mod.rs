//! The console controller.
//!
//! One task owns the [`Store`]. It reacts to three inputs only: user
//! [`Action`]s, scheduler [`Tick`]s and completions of the requests it
//! spawned. Every accepted mutation is followed by a re-render pushed to the
//! [`View`] as an [`Update`].

mod forms;
#[cfg(test)]
mod tests;

pub use forms::{ContactForm, GroupForm};

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::Backend;
use crate::api::models::{Contact, Conversation, Group, Message, NewContact, SendText, Stats};
use crate::error::{ConsoleError, Result};
use crate::import::{self, ImportRow, ImportSummary, Preview};
use crate::render::{self, Listing, MessageRow, Row};
use crate::scheduler::{Periods, Scheduler, Tick};
use crate::store::{DeleteTarget, Modal, Resource, Store, Tab, Ticket};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SwitchTab(Tab),
    Search(String),
    OpenChat(String),
    Send(String),
    /// User-initiated refresh of the active tab.
    Refresh,
    /// Open the contact editor; `Some(phone)` edits an existing contact.
    EditContact(Option<String>),
    SaveContact(ContactForm),
    EditGroup(Option<String>),
    SaveGroup(GroupForm),
    CloseModal,
    RequestDelete(DeleteTarget),
    ConfirmDelete,
    CancelDelete,
    LoadImport(PathBuf),
    ConfirmImport,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Tab(Tab),
    Conversations(Listing<Row>),
    Contacts(Listing<Row>),
    Groups(Listing<Row>),
    ChatOpened { phone: String, title: String },
    ChatClosed,
    Messages { phone: String, listing: Listing<MessageRow>, silent: bool },
    Stats(String),
    Composer { enabled: bool, clear: bool },
    Toast(String),
    ContactEditor { editing: Option<String>, form: ContactForm },
    GroupEditor { editing: Option<String>, form: GroupForm },
    ModalClosed,
    ConfirmDelete(String),
    ImportPreview(Preview),
}

/// Where rendered output goes.
pub trait View: Send + 'static {
    fn apply(&mut self, update: Update);
}

impl View for UnboundedSender<Update> {
    fn apply(&mut self, update: Update) {
        let _ = self.send(update);
    }
}

/// Who asked for a fetch. Background failures are only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    User,
    Background,
}

enum Completion {
    Conversations(Ticket, Origin, Result<Vec<Conversation>>),
    Contacts(Ticket, Origin, Result<Vec<Contact>>),
    Groups(Ticket, Origin, Result<Vec<Group>>),
    Messages(Ticket, Origin, Result<Vec<Message>>),
    Stats(Ticket, Origin, Result<Stats>),
    Sent(Result<()>),
    ContactLoaded(String, Result<Contact>),
    GroupLoaded(String, Result<Group>),
    ContactSaved(Result<Contact>),
    GroupSaved(Result<Group>),
    Deleted(DeleteTarget, Result<()>),
    ImportLoaded(Result<Vec<ImportRow>>),
    Imported(Result<ImportSummary>),
}

pub struct Console<V: View> {
    api: Arc<dyn Backend>,
    store: Store,
    scheduler: Scheduler,
    view: V,
    ticks: UnboundedReceiver<Tick>,
    done_tx: UnboundedSender<Completion>,
    done_rx: UnboundedReceiver<Completion>,
    in_flight: usize,
    sending: bool,
}

impl<V: View> Console<V> {
    pub fn new(api: Arc<dyn Backend>, view: V, periods: Periods) -> Self {
        let (tick_tx, ticks) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            api,
            store: Store::new(),
            scheduler: Scheduler::new(tick_tx, periods),
            view,
            ticks,
            done_tx,
            done_rx,
            in_flight: 0,
            sending: false,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Initial load of every collection plus the polling timers.
    pub fn start(&mut self) {
        self.view.apply(Update::Tab(self.store.active_tab()));
        self.render_all();
        self.refresh_conversations(Origin::User);
        self.refresh_contacts(Origin::User);
        self.refresh_groups(Origin::User);
        self.refresh_stats(Origin::User);
        self.scheduler.start();
    }

    pub async fn run(mut self, mut actions: UnboundedReceiver<Action>) {
        self.start();
        loop {
            tokio::select! {
                action = actions.recv() => match action {
                    Some(action) => {
                        if !self.handle(action) {
                            break;
                        }
                    }
                    None => break,
                },
                Some(tick) = self.ticks.recv() => self.on_tick(tick),
                Some(done) = self.done_rx.recv() => self.complete(done),
            }
        }
        self.scheduler.stop();
        log::info!("console stopped with {} requests in flight", self.in_flight);
    }

    /// Apply one user action. Returns `false` once the console should stop.
    pub fn handle(&mut self, action: Action) -> bool {
        log::debug!("action: {:?}", action);
        match action {
            Action::SwitchTab(tab) => self.switch_tab(tab),
            Action::Search(text) => {
                self.store.set_search(text);
                self.render_tab(self.store.active_tab());
            }
            Action::OpenChat(phone) => self.open_chat(&phone),
            Action::Send(text) => self.send(&text),
            Action::Refresh => self.refresh_active(),
            Action::EditContact(None) => {
                self.store.set_modal(Some(Modal::ContactEditor(None)));
                let form = ContactForm::default();
                self.view.apply(Update::ContactEditor { editing: None, form });
            }
            Action::EditContact(Some(phone)) => {
                let api = self.api.clone();
                let key = phone.clone();
                self.spawn(async move { api.contact(&key).await }, move |r| {
                    Completion::ContactLoaded(phone, r)
                });
            }
            Action::SaveContact(form) => self.save_contact(form),
            Action::EditGroup(None) => {
                self.store.set_modal(Some(Modal::GroupEditor(None)));
                self.view.apply(Update::GroupEditor { editing: None, form: GroupForm::default() });
            }
            Action::EditGroup(Some(id)) => {
                let api = self.api.clone();
                let key = id.clone();
                self.spawn(async move { api.group(&key).await }, move |r| {
                    Completion::GroupLoaded(id, r)
                });
            }
            Action::SaveGroup(form) => self.save_group(form),
            Action::CloseModal => {
                if self.store.modal() == Some(&Modal::Import) {
                    self.store.take_pending_import();
                }
                self.store.set_modal(None);
            }
            Action::RequestDelete(target) => {
                let prompt = self.delete_prompt(&target);
                self.store.set_pending_delete(Some(target));
                self.view.apply(Update::ConfirmDelete(prompt));
            }
            Action::ConfirmDelete => self.delete_confirmed(),
            Action::CancelDelete => self.store.set_pending_delete(None),
            Action::LoadImport(path) => {
                self.spawn(
                    async move {
                        tokio::task::spawn_blocking(move || import::read_file(&path))
                            .await
                            .map_err(|e| ConsoleError::Import(e.to_string()))?
                    },
                    Completion::ImportLoaded,
                );
            }
            Action::ConfirmImport => self.import_confirmed(),
            Action::Shutdown => {
                self.scheduler.stop();
                return false;
            }
        }
        true
    }

    fn on_tick(&mut self, tick: Tick) {
        let resource = match &tick {
            Tick::Conversations => Resource::Conversations,
            Tick::Stats => Resource::Stats,
            Tick::Messages { .. } => Resource::Messages,
        };
        // A slow backend must not have every answer superseded by the next tick.
        if self.store.is_in_flight(resource) {
            log::debug!("skipping {:?} poll, previous fetch still pending", resource);
            return;
        }
        match tick {
            Tick::Conversations => self.refresh_conversations(Origin::Background),
            Tick::Stats => self.refresh_stats(Origin::Background),
            Tick::Messages { phone } => {
                if self.store.current_chat() == Some(phone.as_str()) {
                    self.refresh_messages(Origin::Background);
                } else {
                    log::debug!("dropping tick for closed chat {}", phone);
                }
            }
        }
    }

    fn spawn<T, Fut, W>(&mut self, fut: Fut, wrap: W)
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        W: FnOnce(Result<T>) -> Completion + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.done_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(wrap(fut.await));
        });
    }

    fn toast(&mut self, text: impl Into<String>) {
        self.view.apply(Update::Toast(text.into()));
    }

    /// A user fetch reports its failure even when a newer fetch overtook it,
    /// unless it was for a chat that is no longer open.
    fn fetch_failed(&mut self, ticket: &Ticket, origin: Origin, what: &str, err: &ConsoleError) {
        let current = self.store.finish(ticket);
        let chat_open = ticket.phone().is_none_or(|p| self.store.current_chat() == Some(p));
        match origin {
            Origin::User if chat_open => {
                log::error!("{}: {}", what, err);
                self.toast(err.user_message(what));
            }
            Origin::Background if current => log::warn!("{} (background): {}", what, err),
            _ => log::debug!("{} (stale): {}", what, err),
        }
    }

    // ---- tabs, chat, send -------------------------------------------------

    fn switch_tab(&mut self, tab: Tab) {
        let prev = self.store.active_tab();
        self.store.set_active_tab(tab);
        self.store.set_search("");
        self.view.apply(Update::Tab(tab));

        // The chat poller only runs while the chat is on screen.
        if prev == Tab::Chats && tab != Tab::Chats {
            self.scheduler.unbind_chat();
        }
        if tab == Tab::Chats && prev != Tab::Chats {
            if let Some(phone) = self.store.current_chat().map(str::to_string) {
                self.scheduler.bind_chat(&phone);
                self.refresh_messages(Origin::Background);
            }
        }

        self.render_tab(tab);
        match tab {
            Tab::Chats => self.refresh_conversations(Origin::User),
            Tab::Contacts => self.refresh_contacts(Origin::User),
            Tab::Groups => self.refresh_groups(Origin::User),
        }
    }

    fn open_chat(&mut self, phone: &str) {
        let phone = phone.trim();
        if phone.is_empty() {
            return;
        }
        self.store.open_chat(phone);
        self.scheduler.bind_chat(phone);
        let title = self
            .store
            .conversation(phone)
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| phone.to_string());
        self.view.apply(Update::ChatOpened { phone: phone.to_string(), title });
        // A send still in flight keeps the composer locked across chats.
        self.view.apply(Update::Composer { enabled: !self.sending, clear: true });
        self.refresh_messages(Origin::User);
    }

    fn send(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() || self.sending {
            return;
        }
        let Some(phone) = self.store.current_chat().map(str::to_string) else {
            self.toast("Open a conversation first");
            return;
        };
        self.sending = true;
        self.view.apply(Update::Composer { enabled: false, clear: false });
        let api = self.api.clone();
        let payload = SendText { to: phone, text: text.to_string() };
        self.spawn(async move { api.send_text(&payload).await }, Completion::Sent);
    }

    fn refresh_active(&mut self) {
        match self.store.active_tab() {
            Tab::Chats => {
                self.refresh_conversations(Origin::User);
                self.refresh_messages(Origin::User);
            }
            Tab::Contacts => self.refresh_contacts(Origin::User),
            Tab::Groups => self.refresh_groups(Origin::User),
        }
        self.refresh_stats(Origin::User);
    }

    // ---- fetches ----------------------------------------------------------

    fn refresh_conversations(&mut self, origin: Origin) {
        let ticket = self.store.begin(Resource::Conversations);
        let api = self.api.clone();
        self.spawn(async move { api.conversations().await }, move |r| {
            Completion::Conversations(ticket, origin, r)
        });
    }

    fn refresh_contacts(&mut self, origin: Origin) {
        let ticket = self.store.begin(Resource::Contacts);
        let api = self.api.clone();
        self.spawn(async move { api.contacts().await }, move |r| {
            Completion::Contacts(ticket, origin, r)
        });
    }

    fn refresh_groups(&mut self, origin: Origin) {
        let ticket = self.store.begin(Resource::Groups);
        let api = self.api.clone();
        self.spawn(async move { api.groups().await }, move |r| {
            Completion::Groups(ticket, origin, r)
        });
    }

    fn refresh_stats(&mut self, origin: Origin) {
        let ticket = self.store.begin(Resource::Stats);
        let api = self.api.clone();
        self.spawn(async move { api.stats().await }, move |r| {
            Completion::Stats(ticket, origin, r)
        });
    }

    fn refresh_messages(&mut self, origin: Origin) {
        if self.store.current_chat().is_none() {
            return;
        }
        let ticket = self.store.begin(Resource::Messages);
        let Some(phone) = ticket.phone().map(str::to_string) else { return };
        let api = self.api.clone();
        self.spawn(async move { api.conversation(&phone).await }, move |r| {
            Completion::Messages(ticket, origin, r)
        });
    }

    // ---- completions ------------------------------------------------------

    fn complete(&mut self, done: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match done {
            Completion::Conversations(ticket, origin, result) => match result {
                Ok(list) => {
                    if self.store.replace_conversations(&ticket, list) {
                        self.render_tab(Tab::Chats);
                    }
                }
                Err(e) => self.fetch_failed(&ticket, origin, "Failed to load conversations", &e),
            },
            Completion::Contacts(ticket, origin, result) => match result {
                Ok(list) => {
                    if self.store.replace_contacts(&ticket, list) {
                        self.render_tab(Tab::Contacts);
                    }
                }
                Err(e) => self.fetch_failed(&ticket, origin, "Failed to load contacts", &e),
            },
            Completion::Groups(ticket, origin, result) => match result {
                Ok(list) => {
                    if self.store.replace_groups(&ticket, list) {
                        self.render_tab(Tab::Groups);
                    }
                }
                Err(e) => self.fetch_failed(&ticket, origin, "Failed to load groups", &e),
            },
            Completion::Messages(ticket, origin, result) => match result {
                Ok(list) => {
                    if self.store.replace_messages(&ticket, list) {
                        self.render_messages(origin == Origin::Background);
                    }
                }
                Err(e) => self.fetch_failed(&ticket, origin, "Failed to load messages", &e),
            },
            Completion::Stats(ticket, origin, result) => match result {
                Ok(stats) => {
                    if self.store.replace_stats(&ticket, stats) {
                        if let Some(stats) = self.store.stats() {
                            self.view.apply(Update::Stats(render::stats(&stats)));
                        }
                    }
                }
                Err(e) => self.fetch_failed(&ticket, origin, "Failed to load stats", &e),
            },
            Completion::Sent(result) => {
                self.sending = false;
                match result {
                    Ok(()) => {
                        self.view.apply(Update::Composer { enabled: true, clear: true });
                        self.refresh_messages(Origin::Background);
                        self.refresh_conversations(Origin::Background);
                    }
                    Err(e) => {
                        log::error!("send failed: {}", e);
                        self.view.apply(Update::Composer { enabled: true, clear: false });
                        self.toast(e.user_message("Failed to send message"));
                    }
                }
            }
            Completion::ContactLoaded(phone, result) => match result {
                Ok(contact) => {
                    self.store.set_modal(Some(Modal::ContactEditor(Some(phone.clone()))));
                    let form = ContactForm::from_contact(&contact);
                    self.view.apply(Update::ContactEditor { editing: Some(phone), form });
                }
                Err(e) => self.toast(e.user_message("Failed to load contact")),
            },
            Completion::GroupLoaded(id, result) => match result {
                Ok(group) => {
                    self.store.set_modal(Some(Modal::GroupEditor(Some(id.clone()))));
                    let form = GroupForm::from_group(&group);
                    self.view.apply(Update::GroupEditor { editing: Some(id), form });
                }
                Err(e) => self.toast(e.user_message("Failed to load group")),
            },
            Completion::ContactSaved(result) => match result {
                Ok(contact) => {
                    log::info!("contact {} saved", contact.phone);
                    self.close_modal();
                    self.toast("Contact saved");
                    self.refresh_contacts(Origin::User);
                }
                // The editor stays open with the user's input intact.
                Err(e) => self.toast(e.user_message("Failed to save contact")),
            },
            Completion::GroupSaved(result) => match result {
                Ok(group) => {
                    log::info!("group {} saved", group.group_id);
                    self.close_modal();
                    self.toast("Group saved");
                    self.refresh_groups(Origin::User);
                }
                Err(e) => self.toast(e.user_message("Failed to save group")),
            },
            Completion::Deleted(target, result) => self.deleted(target, result),
            Completion::ImportLoaded(result) => match result {
                Ok(rows) if rows.is_empty() => self.toast("No rows with a phone number found"),
                Ok(rows) => {
                    let preview = Preview::of(&rows);
                    self.store.set_pending_import(rows);
                    self.store.set_modal(Some(Modal::Import));
                    self.view.apply(Update::ImportPreview(preview));
                }
                Err(e) => {
                    log::error!("import read failed: {}", e);
                    self.toast(e.user_message("Could not read the spreadsheet"));
                }
            },
            Completion::Imported(result) => match result {
                Ok(summary) => {
                    log::info!("{}", summary);
                    self.toast(summary.to_string());
                    self.refresh_contacts(Origin::User);
                }
                Err(e) => self.toast(e.user_message("Import failed")),
            },
        }
    }

    // ---- modals -----------------------------------------------------------

    fn close_modal(&mut self) {
        self.store.set_modal(None);
        self.view.apply(Update::ModalClosed);
    }

    fn save_contact(&mut self, form: ContactForm) {
        let Some(Modal::ContactEditor(editing)) = self.store.modal().cloned() else {
            log::warn!("save_contact without an open editor");
            return;
        };
        let api = self.api.clone();
        match editing {
            None => match form.to_new() {
                Ok(new) => self.spawn(
                    async move { api.create_contact(&new).await },
                    Completion::ContactSaved,
                ),
                Err(e) => self.toast(e.user_message("Invalid contact")),
            },
            Some(phone) => {
                let update = form.to_update();
                self.spawn(
                    async move { api.update_contact(&phone, &update).await },
                    Completion::ContactSaved,
                );
            }
        }
    }

    fn save_group(&mut self, form: GroupForm) {
        let Some(Modal::GroupEditor(editing)) = self.store.modal().cloned() else {
            log::warn!("save_group without an open editor");
            return;
        };
        let api = self.api.clone();
        match editing {
            None => match form.to_new() {
                Ok(new) => {
                    self.spawn(async move { api.create_group(&new).await }, Completion::GroupSaved)
                }
                Err(e) => self.toast(e.user_message("Invalid group")),
            },
            Some(id) => match form.to_update() {
                Ok(update) => self.spawn(
                    async move { api.update_group(&id, &update).await },
                    Completion::GroupSaved,
                ),
                Err(e) => self.toast(e.user_message("Invalid group")),
            },
        }
    }

    fn delete_prompt(&self, target: &DeleteTarget) -> String {
        match target {
            DeleteTarget::Contact(phone) => {
                let name = self
                    .store
                    .contacts()
                    .iter()
                    .find(|c| &c.phone == phone)
                    .map(|c| c.display_name());
                match name {
                    Some(n) if n != phone.as_str() => format!("Delete contact {} ({})?", n, phone),
                    _ => format!("Delete contact {}?", phone),
                }
            }
            DeleteTarget::Group(id) => {
                let name = self
                    .store
                    .groups()
                    .iter()
                    .find(|g| &g.group_id == id)
                    .map(|g| g.name.as_str());
                format!("Delete group {}?", name.filter(|n| !n.is_empty()).unwrap_or(id))
            }
            DeleteTarget::Conversation(phone) => format!("Delete the conversation with {}?", phone),
        }
    }

    fn delete_confirmed(&mut self) {
        let Some(target) = self.store.take_pending_delete() else {
            log::debug!("delete confirmed with nothing pending");
            return;
        };
        let api = self.api.clone();
        let key = target.clone();
        self.spawn(
            async move {
                match &key {
                    DeleteTarget::Contact(phone) => api.delete_contact(phone).await,
                    DeleteTarget::Group(id) => api.delete_group(id).await,
                    DeleteTarget::Conversation(phone) => api.delete_conversation(phone).await,
                }
            },
            move |r| Completion::Deleted(target, r),
        );
    }

    fn deleted(&mut self, target: DeleteTarget, result: Result<()>) {
        let what = match &target {
            DeleteTarget::Contact(_) => "contact",
            DeleteTarget::Group(_) => "group",
            DeleteTarget::Conversation(_) => "conversation",
        };
        if let Err(e) = result {
            log::error!("delete {} failed: {}", what, e);
            self.toast(e.user_message(&format!("Failed to delete {}", what)));
            return;
        }
        self.toast(format!("Deleted {}", what));
        match target {
            DeleteTarget::Contact(_) => self.refresh_contacts(Origin::User),
            DeleteTarget::Group(_) => self.refresh_groups(Origin::User),
            DeleteTarget::Conversation(phone) => {
                if self.store.current_chat() == Some(phone.as_str()) {
                    self.store.close_chat();
                    self.scheduler.unbind_chat();
                    self.view.apply(Update::ChatClosed);
                }
                self.refresh_conversations(Origin::User);
            }
        }
    }

    fn import_confirmed(&mut self) {
        let rows = self.store.take_pending_import();
        if rows.is_empty() {
            return;
        }
        self.close_modal();
        self.toast(format!("Importing {} contacts\u{2026}", rows.len()));
        let api = self.api.clone();
        self.spawn(
            async move {
                let mut summary = ImportSummary::default();
                for row in &rows {
                    match api.create_contact(&NewContact::from(row)).await {
                        Ok(_) => summary.imported += 1,
                        Err(e) => {
                            summary.failed += 1;
                            log::warn!("import of {} failed: {}", row.phone, e);
                        }
                    }
                }
                Ok(summary)
            },
            Completion::Imported,
        );
    }

    // ---- rendering --------------------------------------------------------

    fn filter_for(&self, tab: Tab) -> &str {
        if self.store.active_tab() == tab { self.store.search() } else { "" }
    }

    fn render_tab(&mut self, tab: Tab) {
        let filter = self.filter_for(tab);
        let update = match tab {
            Tab::Chats => {
                let conversations = self.store.conversations();
                Update::Conversations(render::conversations(conversations, filter, Utc::now()))
            }
            Tab::Contacts => Update::Contacts(render::contacts(self.store.contacts(), filter)),
            Tab::Groups => Update::Groups(render::groups(self.store.groups(), filter)),
        };
        self.view.apply(update);
    }

    fn render_all(&mut self) {
        for tab in [Tab::Chats, Tab::Contacts, Tab::Groups] {
            self.render_tab(tab);
        }
    }

    fn render_messages(&mut self, silent: bool) {
        let Some(phone) = self.store.current_chat().map(str::to_string) else { return };
        let listing = render::messages(self.store.current_messages());
        self.view.apply(Update::Messages { phone, listing, silent });
    }

    /// Drive ticks and completions until `span` of (paused) time has passed.
    #[cfg(test)]
    async fn run_for(&mut self, span: std::time::Duration) {
        let deadline = tokio::time::Instant::now() + span;
        loop {
            tokio::select! {
                Some(tick) = self.ticks.recv() => self.on_tick(tick),
                Some(done) = self.done_rx.recv() => self.complete(done),
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }
    }

    /// Drain completions until nothing is in flight.
    #[cfg(test)]
    async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.done_rx.recv().await {
                Some(done) => self.complete(done),
                None => break,
            }
        }
    }
}
