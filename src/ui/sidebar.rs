use std::cell::RefCell;
use std::rc::Rc;

use gtk4::prelude::*;
use gtk4 as gtk;

use crate::render::{Listing, Row};

/// One tab's list: markup rows keyed by phone or group id, or a placeholder.
pub struct Sidebar {
    root: gtk::Box,
    list: gtk::ListBox,
    empty: gtk::Label,
    keys: Rc<RefCell<Vec<String>>>,
}

impl Sidebar {
    pub fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);

        let list = gtk::ListBox::new();
        list.add_css_class("navigation-sidebar");
        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hscrollbar_policy(gtk::PolicyType::Never)
            .child(&list)
            .build();
        root.append(&scroller);

        let empty = gtk::Label::new(None);
        empty.add_css_class("dim-label");
        empty.set_vexpand(true);
        empty.set_visible(false);
        root.append(&empty);

        Self { root, list, empty, keys: Rc::new(RefCell::new(Vec::new())) }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// Calls `f` with the key of the activated row.
    pub fn connect_activated<F: Fn(String) + 'static>(&self, f: F) {
        let keys = self.keys.clone();
        self.list.connect_row_activated(move |_, row| {
            let key = usize::try_from(row.index()).ok().and_then(|i| keys.borrow().get(i).cloned());
            if let Some(key) = key {
                f(key);
            }
        });
    }

    pub fn set_listing(&self, listing: &Listing<Row>) {
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
        let mut keys = self.keys.borrow_mut();
        keys.clear();
        match listing {
            Listing::Empty(text) => {
                self.empty.set_markup(text);
                self.empty.set_visible(true);
            }
            Listing::Rows(rows) => {
                self.empty.set_visible(false);
                for r in rows {
                    let label = gtk::Label::new(None);
                    label.set_markup(&r.markup);
                    label.set_margin_top(6);
                    label.set_margin_bottom(6);
                    label.set_margin_start(8);
                    label.set_margin_end(8);
                    label.set_halign(gtk::Align::Start);
                    label.set_xalign(0.0);
                    label.set_wrap(true);
                    let row = gtk::ListBoxRow::new();
                    row.set_child(Some(&label));
                    self.list.append(&row);
                    keys.push(r.key.clone());
                }
            }
        }
    }
}
