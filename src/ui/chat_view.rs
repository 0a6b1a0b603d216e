use std::cell::RefCell;
use std::rc::Rc;

use gtk4::prelude::*;
use gtk4 as gtk;

use crate::render::{self, Listing, MessageRow, ScrollPosition};

pub struct ChatView {
    root: gtk::Box,
    title: gtk::Label,
    delete_btn: gtk::Button,
    scroller: gtk::ScrolledWindow,
    messages_box: gtk::Box,
    entry: gtk::Entry,
    send_btn: gtk::Button,
    phone: Rc<RefCell<Option<String>>>,
}

impl ChatView {
    pub fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);

        let top = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let title = gtk::Label::new(Some("No conversation selected"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        title.set_hexpand(true);
        let delete_btn = gtk::Button::from_icon_name("user-trash-symbolic");
        delete_btn.set_tooltip_text(Some("Delete conversation"));
        delete_btn.set_sensitive(false);
        top.append(&title);
        top.append(&delete_btn);
        root.append(&top);

        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .build();
        let messages_box = gtk::Box::new(gtk::Orientation::Vertical, 6);
        scroller.set_child(Some(&messages_box));
        root.append(&scroller);

        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Type a message…"));
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        input_row.append(&entry);
        input_row.append(&send_btn);
        root.append(&input_row);

        let view = Self {
            root,
            title,
            delete_btn,
            scroller,
            messages_box,
            entry,
            send_btn,
            phone: Rc::new(RefCell::new(None)),
        };
        view.set_composer(false, false);
        view
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// `f` receives the raw composer text; blank text is filtered downstream.
    pub fn connect_send<F: Fn(String) + 'static>(&self, f: F) {
        let entry = self.entry.clone();
        let send: Rc<dyn Fn()> = Rc::new(move || f(entry.text().to_string()));
        {
            let send = send.clone();
            self.send_btn.connect_clicked(move |_| (send)());
        }
        self.entry.connect_activate(move |_| (send)());
    }

    pub fn connect_delete<F: Fn(String) + 'static>(&self, f: F) {
        let phone = self.phone.clone();
        self.delete_btn.connect_clicked(move |_| {
            if let Some(p) = phone.borrow().clone() {
                f(p);
            }
        });
    }

    pub fn open(&self, phone: &str, title: &str) {
        *self.phone.borrow_mut() = Some(phone.to_string());
        self.title.set_text(title);
        self.delete_btn.set_sensitive(true);
        self.clear_messages();
        // The console follows up with the composer state; a send in flight keeps it locked.
        self.entry.grab_focus();
    }

    pub fn close(&self) {
        *self.phone.borrow_mut() = None;
        self.title.set_text("No conversation selected");
        self.delete_btn.set_sensitive(false);
        self.clear_messages();
        self.set_composer(false, true);
    }

    pub fn set_composer(&self, enabled: bool, clear: bool) {
        let open = self.phone.borrow().is_some();
        self.entry.set_sensitive(enabled && open);
        self.send_btn.set_sensitive(enabled && open);
        if clear {
            self.entry.set_text("");
        }
    }

    pub fn set_messages(&self, phone: &str, listing: &Listing<MessageRow>, silent: bool) {
        if self.phone.borrow().as_deref() != Some(phone) {
            return;
        }
        let adj = self.scroller.vadjustment();
        let before = ScrollPosition {
            value: adj.value(),
            upper: adj.upper(),
            page_size: adj.page_size(),
        };

        self.clear_messages();
        match listing {
            Listing::Empty(text) => {
                let lbl = gtk::Label::new(Some(text));
                lbl.add_css_class("dim-label");
                lbl.set_vexpand(true);
                self.messages_box.append(&lbl);
            }
            Listing::Rows(rows) => {
                for m in rows {
                    let lbl = gtk::Label::new(None);
                    lbl.set_markup(&m.markup);
                    lbl.set_wrap(true);
                    lbl.set_selectable(true);
                    lbl.add_css_class("card");
                    lbl.set_margin_start(6);
                    lbl.set_margin_end(6);
                    if m.outgoing {
                        lbl.set_halign(gtk::Align::End);
                        lbl.set_xalign(1.0);
                    } else {
                        lbl.set_halign(gtk::Align::Start);
                        lbl.set_xalign(0.0);
                    }
                    self.messages_box.append(&lbl);
                }
            }
        }

        if render::stick_to_bottom(before, silent) {
            // Upper is only known after the next layout pass.
            glib::idle_add_local_once(move || {
                adj.set_value(adj.upper() - adj.page_size());
            });
        } else {
            adj.set_value(before.value);
        }
    }

    fn clear_messages(&self) {
        while let Some(child) = self.messages_box.first_child() {
            self.messages_box.remove(&child);
        }
    }
}
