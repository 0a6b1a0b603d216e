use crate::api::models::{Contact, Conversation, Group, Message, Stats};
use crate::import::ImportRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Chats,
    Contacts,
    Groups,
}

/// Something the store fetches wholesale from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Conversations,
    Contacts,
    Groups,
    Messages,
    Stats,
}

impl Resource {
    const ALL: usize = 5;

    fn slot(self) -> usize {
        match self {
            Self::Conversations => 0,
            Self::Contacts => 1,
            Self::Groups => 2,
            Self::Messages => 3,
            Self::Stats => 4,
        }
    }
}

/// Handed out when a fetch starts. A response is applied only if its ticket
/// is still the newest one for that resource (and, for messages, the chat is
/// still the one that was asked for).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub resource: Resource,
    generation: u64,
    phone: Option<String>,
}

impl Ticket {
    /// The chat a message ticket was issued for.
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Contact(String),
    Group(String),
    Conversation(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    /// `None` while creating, the contact's phone while editing.
    ContactEditor(Option<String>),
    GroupEditor(Option<String>),
    Import,
}

#[derive(Debug, Default)]
pub struct Store {
    conversations: Vec<Conversation>,
    contacts: Vec<Contact>,
    groups: Vec<Group>,
    current_chat: Option<String>,
    current_messages: Vec<Message>,
    active_tab: Tab,
    search: String,
    stats: Option<Stats>,
    pending_import: Vec<ImportRow>,
    pending_delete: Option<DeleteTarget>,
    modal: Option<Modal>,
    generations: [u64; Resource::ALL],
    in_flight: [bool; Resource::ALL],
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn current_chat(&self) -> Option<&str> {
        self.current_chat.as_deref()
    }

    pub fn current_messages(&self) -> &[Message] {
        &self.current_messages
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn set_active_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    pub fn stats(&self) -> Option<Stats> {
        self.stats
    }

    /// Start a fetch: every earlier ticket for `resource` goes stale.
    pub fn begin(&mut self, resource: Resource) -> Ticket {
        self.in_flight[resource.slot()] = true;
        let slot = &mut self.generations[resource.slot()];
        *slot += 1;
        let phone = match resource {
            Resource::Messages => self.current_chat.clone(),
            _ => None,
        };
        Ticket { resource, generation: *slot, phone }
    }

    /// Whether the newest fetch of `resource` has not answered yet.
    pub fn is_in_flight(&self, resource: Resource) -> bool {
        self.in_flight[resource.slot()]
    }

    /// Record that `ticket`'s fetch answered. Returns whether it is still
    /// current.
    pub fn finish(&mut self, ticket: &Ticket) -> bool {
        let slot = ticket.resource.slot();
        if self.generations[slot] == ticket.generation {
            self.in_flight[slot] = false;
        }
        self.is_current(ticket)
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        if self.generations[ticket.resource.slot()] != ticket.generation {
            return false;
        }
        match ticket.resource {
            Resource::Messages => ticket.phone.is_some() && ticket.phone == self.current_chat,
            _ => true,
        }
    }

    pub fn replace_conversations(&mut self, ticket: &Ticket, list: Vec<Conversation>) -> bool {
        if !self.accept(ticket, Resource::Conversations) {
            return false;
        }
        self.conversations = list;
        true
    }

    pub fn replace_contacts(&mut self, ticket: &Ticket, list: Vec<Contact>) -> bool {
        if !self.accept(ticket, Resource::Contacts) {
            return false;
        }
        self.contacts = list;
        true
    }

    pub fn replace_groups(&mut self, ticket: &Ticket, list: Vec<Group>) -> bool {
        if !self.accept(ticket, Resource::Groups) {
            return false;
        }
        self.groups = list;
        true
    }

    pub fn replace_messages(&mut self, ticket: &Ticket, list: Vec<Message>) -> bool {
        if !self.accept(ticket, Resource::Messages) {
            return false;
        }
        self.current_messages = list;
        true
    }

    pub fn replace_stats(&mut self, ticket: &Ticket, stats: Stats) -> bool {
        if !self.accept(ticket, Resource::Stats) {
            return false;
        }
        self.stats = Some(stats);
        true
    }

    fn accept(&mut self, ticket: &Ticket, resource: Resource) -> bool {
        let ok = ticket.resource == resource && self.finish(ticket);
        if !ok {
            log::debug!("discarding stale {:?} response", resource);
        }
        ok
    }

    /// Make `phone` the open chat. The previous chat's messages are dropped
    /// and any in-flight message fetch is invalidated.
    pub fn open_chat(&mut self, phone: impl Into<String>) {
        self.current_chat = Some(phone.into());
        self.current_messages.clear();
        self.generations[Resource::Messages.slot()] += 1;
        self.in_flight[Resource::Messages.slot()] = false;
    }

    pub fn close_chat(&mut self) -> Option<String> {
        self.current_messages.clear();
        self.generations[Resource::Messages.slot()] += 1;
        self.in_flight[Resource::Messages.slot()] = false;
        self.current_chat.take()
    }

    pub fn conversation(&self, phone: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.phone == phone)
    }

    pub fn pending_import(&self) -> &[ImportRow] {
        &self.pending_import
    }

    pub fn set_pending_import(&mut self, rows: Vec<ImportRow>) {
        self.pending_import = rows;
    }

    pub fn take_pending_import(&mut self) -> Vec<ImportRow> {
        std::mem::take(&mut self.pending_import)
    }

    pub fn set_pending_delete(&mut self, target: Option<DeleteTarget>) {
        self.pending_delete = target;
    }

    pub fn take_pending_delete(&mut self) -> Option<DeleteTarget> {
        self.pending_delete.take()
    }

    pub fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    pub fn set_modal(&mut self, modal: Option<Modal>) {
        self.modal = modal;
    }
}
