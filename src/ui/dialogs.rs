//! Modal dialogs. None of them talk to the backend; they only emit actions
//! and are closed by the main window when the console says so.

use gtk4::prelude::*;
use gtk4 as gtk;
use tokio::sync::mpsc::UnboundedSender;

use crate::console::{Action, ContactForm, GroupForm};
use crate::import::Preview;
use crate::store::DeleteTarget;

const DELETE: gtk::ResponseType = gtk::ResponseType::Other(1);

fn dialog(parent: &impl IsA<gtk::Window>, title: &str) -> (gtk::Dialog, gtk::Box) {
    let dialog = gtk::Dialog::builder().title(title).transient_for(parent).modal(true).build();
    let content = gtk::Box::new(gtk::Orientation::Vertical, 8);
    content.set_margin_top(12);
    content.set_margin_bottom(12);
    content.set_margin_start(12);
    content.set_margin_end(12);
    dialog.set_child(Some(&content));
    (dialog, content)
}

fn field(content: &gtk::Box, placeholder: &str, value: &str) -> gtk::Entry {
    let entry = gtk::Entry::new();
    entry.set_placeholder_text(Some(placeholder));
    entry.set_text(value);
    entry.set_hexpand(true);
    content.append(&entry);
    entry
}

/// The editor stays open after Save; a failed save leaves the input intact.
pub fn contact_editor(
    parent: &impl IsA<gtk::Window>,
    editing: Option<String>,
    form: &ContactForm,
    actions: UnboundedSender<Action>,
) -> gtk::Dialog {
    let title = if editing.is_some() { "Edit Contact" } else { "New Contact" };
    let (dialog, content) = dialog(parent, title);

    let phone = field(&content, "Phone", &form.phone);
    phone.set_sensitive(editing.is_none());
    let name = field(&content, "Name", &form.name);
    let notes = field(&content, "Notes", &form.notes);
    let labels = field(&content, "Labels (comma separated)", &form.labels);
    let groups = field(&content, "Groups (comma separated)", &form.groups);
    let business = gtk::CheckButton::with_label("Business account");
    business.set_active(form.is_business);
    content.append(&business);

    let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
    if editing.is_some() {
        let del = dialog.add_button("Delete", DELETE);
        del.add_css_class("destructive-action");
    }
    let ok_btn = dialog.add_button("Save", gtk::ResponseType::Ok);
    ok_btn.add_css_class("suggested-action");
    dialog.set_default_response(gtk::ResponseType::Ok);

    dialog.connect_response(move |dlg, resp| match resp {
        gtk::ResponseType::Ok => {
            let form = ContactForm {
                phone: phone.text().to_string(),
                name: name.text().to_string(),
                notes: notes.text().to_string(),
                labels: labels.text().to_string(),
                groups: groups.text().to_string(),
                is_business: business.is_active(),
            };
            let _ = actions.send(Action::SaveContact(form));
        }
        DELETE => {
            if let Some(phone) = editing.clone() {
                let _ = actions.send(Action::CloseModal);
                let _ = actions.send(Action::RequestDelete(DeleteTarget::Contact(phone)));
            }
            dlg.destroy();
        }
        _ => {
            let _ = actions.send(Action::CloseModal);
            dlg.destroy();
        }
    });
    dialog
}

pub fn group_editor(
    parent: &impl IsA<gtk::Window>,
    editing: Option<String>,
    form: &GroupForm,
    actions: UnboundedSender<Action>,
) -> gtk::Dialog {
    let title = if editing.is_some() { "Edit Group" } else { "New Group" };
    let (dialog, content) = dialog(parent, title);

    let group_id = field(&content, "Group ID", &form.group_id);
    group_id.set_sensitive(editing.is_none());
    let name = field(&content, "Name", &form.name);
    let description = field(&content, "Description", &form.description);
    // Members are fixed once the group exists.
    let participants = field(&content, "Participants (comma separated)", &form.participants);
    let admins = field(&content, "Admins (comma separated)", &form.admins);
    participants.set_sensitive(editing.is_none());
    admins.set_sensitive(editing.is_none());
    let active = gtk::CheckButton::with_label("Active");
    active.set_active(form.is_active);
    active.set_visible(editing.is_some());
    content.append(&active);

    let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
    if editing.is_some() {
        let del = dialog.add_button("Delete", DELETE);
        del.add_css_class("destructive-action");
    }
    let ok_btn = dialog.add_button("Save", gtk::ResponseType::Ok);
    ok_btn.add_css_class("suggested-action");
    dialog.set_default_response(gtk::ResponseType::Ok);

    dialog.connect_response(move |dlg, resp| match resp {
        gtk::ResponseType::Ok => {
            let form = GroupForm {
                group_id: group_id.text().to_string(),
                name: name.text().to_string(),
                description: description.text().to_string(),
                participants: participants.text().to_string(),
                admins: admins.text().to_string(),
                is_active: active.is_active(),
            };
            let _ = actions.send(Action::SaveGroup(form));
        }
        DELETE => {
            if let Some(id) = editing.clone() {
                let _ = actions.send(Action::CloseModal);
                let _ = actions.send(Action::RequestDelete(DeleteTarget::Group(id)));
            }
            dlg.destroy();
        }
        _ => {
            let _ = actions.send(Action::CloseModal);
            dlg.destroy();
        }
    });
    dialog
}

pub fn confirm_delete(
    parent: &impl IsA<gtk::Window>,
    prompt: &str,
    actions: UnboundedSender<Action>,
) -> gtk::Dialog {
    let (dialog, content) = dialog(parent, "Confirm Delete");
    let label = gtk::Label::new(Some(prompt));
    label.set_wrap(true);
    content.append(&label);

    let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
    let del = dialog.add_button("Delete", gtk::ResponseType::Accept);
    del.add_css_class("destructive-action");

    dialog.connect_response(move |dlg, resp| {
        let action = if resp == gtk::ResponseType::Accept {
            Action::ConfirmDelete
        } else {
            Action::CancelDelete
        };
        let _ = actions.send(action);
        dlg.destroy();
    });
    dialog
}

pub fn import_preview(
    parent: &impl IsA<gtk::Window>,
    preview: &Preview,
    actions: UnboundedSender<Action>,
) -> gtk::Dialog {
    let (dialog, content) = dialog(parent, "Import Contacts");

    let header = gtk::Label::new(Some(&format!("{} contacts found", preview.total())));
    header.add_css_class("heading");
    header.set_halign(gtk::Align::Start);
    content.append(&header);

    let grid = gtk::Grid::builder().column_spacing(12).row_spacing(4).build();
    for (col, title) in ["Phone", "Name", "Labels"].iter().enumerate() {
        let lbl = gtk::Label::new(Some(title));
        lbl.add_css_class("dim-label");
        lbl.set_halign(gtk::Align::Start);
        grid.attach(&lbl, col as i32, 0, 1, 1);
    }
    for (i, row) in preview.rows.iter().enumerate() {
        let cells = [
            row.phone.clone(),
            row.name.clone().unwrap_or_default(),
            row.labels.join(", "),
        ];
        for (col, text) in cells.iter().enumerate() {
            let lbl = gtk::Label::new(Some(text));
            lbl.set_halign(gtk::Align::Start);
            grid.attach(&lbl, col as i32, i as i32 + 1, 1, 1);
        }
    }
    content.append(&grid);

    if preview.remaining > 0 {
        let more = gtk::Label::new(Some(&format!("and {} more", preview.remaining)));
        more.add_css_class("dim-label");
        more.set_halign(gtk::Align::Start);
        content.append(&more);
    }

    let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
    let ok_btn = dialog.add_button("Import", gtk::ResponseType::Ok);
    ok_btn.add_css_class("suggested-action");

    dialog.connect_response(move |dlg, resp| {
        if resp == gtk::ResponseType::Ok {
            let _ = actions.send(Action::ConfirmImport);
        } else {
            let _ = actions.send(Action::CloseModal);
        }
        dlg.destroy();
    });
    dialog
}

pub fn choose_spreadsheet(parent: &impl IsA<gtk::Window>, actions: UnboundedSender<Action>) {
    let chooser = gtk::FileChooserNative::new(
        Some("Import Contacts"),
        Some(parent),
        gtk::FileChooserAction::Open,
        Some("Open"),
        Some("Cancel"),
    );
    let filter = gtk::FileFilter::new();
    filter.set_name(Some("Spreadsheets"));
    for pattern in ["*.csv", "*.xlsx", "*.xls", "*.ods"] {
        filter.add_pattern(pattern);
    }
    chooser.add_filter(&filter);

    // Native dialogs are not owned by a parent widget; hold a ref until answered.
    let keep = std::cell::RefCell::new(Some(chooser.clone()));
    chooser.connect_response(move |chooser, resp| {
        if resp == gtk::ResponseType::Accept {
            if let Some(path) = chooser.file().and_then(|f| f.path()) {
                let _ = actions.send(Action::LoadImport(path));
            }
        }
        chooser.destroy();
        keep.borrow_mut().take();
    });
    chooser.show();
}
