use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use adw::prelude::*;
use adw::Application;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::api::client::ApiClient;
use crate::app::AppState;
use crate::console::{Action, Console, Update, View};
use crate::store::{DeleteTarget, Tab};
use crate::ui::chat_view::ChatView;
use crate::ui::dialogs;
use crate::ui::sidebar::Sidebar;

/// Forwards console output to the GTK main loop.
struct GlibView(glib::Sender<Update>);

impl View for GlibView {
    fn apply(&mut self, update: Update) {
        let _ = self.0.send(update);
    }
}

fn tab_name(tab: Tab) -> &'static str {
    match tab {
        Tab::Chats => "chats",
        Tab::Contacts => "contacts",
        Tab::Groups => "groups",
    }
}

pub fn show_main_window(app: &Application, state: AppState) {
    let client = match ApiClient::new(&state.base_url) {
        Ok(c) => c,
        Err(e) => {
            log::error!("invalid server URL {:?}: {}", state.base_url, e);
            crate::ui::login::show_login_window(app);
            return;
        }
    };

    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("WhatsApp Console")
        .default_width(1024)
        .default_height(680)
        .build();

    let overlay = adw::ToastOverlay::new();

    let split = adw::Flap::builder()
        .reveal_flap(true)
        .locked(true)
        .modal(false)
        .build();

    let stack = gtk4::Stack::new();
    stack.set_width_request(320);
    let chats = Rc::new(Sidebar::new());
    let contacts = Rc::new(Sidebar::new());
    let groups = Rc::new(Sidebar::new());
    stack.add_named(&chats.widget(), Some(tab_name(Tab::Chats)));
    stack.add_named(&contacts.widget(), Some(tab_name(Tab::Contacts)));
    stack.add_named(&groups.widget(), Some(tab_name(Tab::Groups)));

    let side = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    let search = gtk4::SearchEntry::new();
    search.set_placeholder_text(Some("Search"));
    search.set_margin_top(8);
    search.set_margin_start(8);
    search.set_margin_end(8);
    side.append(&search);
    side.append(&stack);
    split.set_flap(Some(&side));

    let chat = Rc::new(ChatView::new());
    split.set_content(Some(&chat.widget()));
    overlay.set_child(Some(&split));

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let window_title = adw::WindowTitle::new("WhatsApp Console", "");
    header.set_title_widget(Some(&window_title));

    let tabs_box = gtk4::Box::new(gtk4::Orientation::Horizontal, 0);
    tabs_box.add_css_class("linked");
    let chats_btn = gtk4::ToggleButton::with_label("Chats");
    let contacts_btn = gtk4::ToggleButton::with_label("Contacts");
    let groups_btn = gtk4::ToggleButton::with_label("Groups");
    contacts_btn.set_group(Some(&chats_btn));
    groups_btn.set_group(Some(&chats_btn));
    chats_btn.set_active(true);
    tabs_box.append(&chats_btn);
    tabs_box.append(&contacts_btn);
    tabs_box.append(&groups_btn);
    header.pack_start(&tabs_box);

    let refresh_btn = gtk4::Button::from_icon_name("view-refresh-symbolic");
    refresh_btn.set_tooltip_text(Some("Refresh"));
    let import_btn = gtk4::Button::with_label("Import");
    let new_group_btn = gtk4::Button::with_label("New Group");
    let new_contact_btn = gtk4::Button::with_label("New Contact");
    new_contact_btn.add_css_class("suggested-action");
    header.pack_end(&refresh_btn);
    header.pack_end(&import_btn);
    header.pack_end(&new_group_btn);
    header.pack_end(&new_contact_btn);

    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));

    let (actions, action_rx) = mpsc::unbounded_channel::<Action>();
    let (update_tx, update_rx) = crate::utils::glib_channel::<Update>();
    let console = Console::new(Arc::new(client), GlibView(update_tx), state.polling.periods());
    crate::utils::spawn_async(console.run(action_rx));

    let syncing = Rc::new(Cell::new(false));
    wire_inputs(&Inputs {
        window: window.clone(),
        actions: actions.clone(),
        syncing: syncing.clone(),
        tabs: [
            (chats_btn.clone(), Tab::Chats),
            (contacts_btn.clone(), Tab::Contacts),
            (groups_btn.clone(), Tab::Groups),
        ],
        search: search.clone(),
        refresh_btn,
        import_btn,
        new_group_btn,
        new_contact_btn,
    });

    {
        let actions = actions.clone();
        chats.connect_activated(move |phone| {
            let _ = actions.send(Action::OpenChat(phone));
        });
    }
    {
        let actions = actions.clone();
        contacts.connect_activated(move |phone| {
            let _ = actions.send(Action::EditContact(Some(phone)));
        });
    }
    {
        let actions = actions.clone();
        groups.connect_activated(move |id| {
            let _ = actions.send(Action::EditGroup(Some(id)));
        });
    }
    {
        let actions = actions.clone();
        chat.connect_send(move |text| {
            let _ = actions.send(Action::Send(text));
        });
    }
    {
        let actions = actions.clone();
        chat.connect_delete(move |phone| {
            let _ = actions.send(Action::RequestDelete(DeleteTarget::Conversation(phone)));
        });
    }
    {
        let actions = actions.clone();
        window.connect_close_request(move |_| {
            let _ = actions.send(Action::Shutdown);
            glib::Propagation::Proceed
        });
    }

    let modal: Rc<RefCell<Option<gtk4::Dialog>>> = Rc::new(RefCell::new(None));
    let show_modal = {
        let modal = modal.clone();
        move |dialog: gtk4::Dialog| {
            let previous = modal.borrow_mut().replace(dialog.clone());
            if let Some(prev) = previous {
                prev.destroy();
            }
            dialog.present();
        }
    };

    let tab_buttons = [
        (chats_btn, Tab::Chats),
        (contacts_btn, Tab::Contacts),
        (groups_btn, Tab::Groups),
    ];
    let win = window.clone();
    update_rx.attach(None, move |update| {
        match update {
            Update::Tab(tab) => {
                syncing.set(true);
                stack.set_visible_child_name(tab_name(tab));
                for (btn, t) in &tab_buttons {
                    if *t == tab {
                        btn.set_active(true);
                    }
                }
                search.set_text("");
                syncing.set(false);
            }
            Update::Conversations(listing) => chats.set_listing(&listing),
            Update::Contacts(listing) => contacts.set_listing(&listing),
            Update::Groups(listing) => groups.set_listing(&listing),
            Update::ChatOpened { phone, title } => chat.open(&phone, &title),
            Update::ChatClosed => chat.close(),
            Update::Messages { phone, listing, silent } => {
                chat.set_messages(&phone, &listing, silent)
            }
            Update::Stats(text) => window_title.set_subtitle(&text),
            Update::Composer { enabled, clear } => chat.set_composer(enabled, clear),
            Update::Toast(msg) => overlay.add_toast(adw::Toast::new(&msg)),
            Update::ContactEditor { editing, form } => {
                show_modal(dialogs::contact_editor(&win, editing, &form, actions.clone()));
            }
            Update::GroupEditor { editing, form } => {
                show_modal(dialogs::group_editor(&win, editing, &form, actions.clone()));
            }
            Update::ImportPreview(preview) => {
                show_modal(dialogs::import_preview(&win, &preview, actions.clone()));
            }
            Update::ModalClosed => {
                let open = modal.borrow_mut().take();
                if let Some(dialog) = open {
                    dialog.destroy();
                }
            }
            Update::ConfirmDelete(prompt) => {
                dialogs::confirm_delete(&win, &prompt, actions.clone()).present();
            }
        }
        glib::ControlFlow::Continue
    });

    window.present();
}

struct Inputs {
    window: adw::ApplicationWindow,
    actions: UnboundedSender<Action>,
    syncing: Rc<Cell<bool>>,
    tabs: [(gtk4::ToggleButton, Tab); 3],
    search: gtk4::SearchEntry,
    refresh_btn: gtk4::Button,
    import_btn: gtk4::Button,
    new_group_btn: gtk4::Button,
    new_contact_btn: gtk4::Button,
}

fn wire_inputs(inputs: &Inputs) {
    for (btn, tab) in &inputs.tabs {
        let actions = inputs.actions.clone();
        let syncing = inputs.syncing.clone();
        let tab = *tab;
        btn.connect_toggled(move |b| {
            if b.is_active() && !syncing.get() {
                let _ = actions.send(Action::SwitchTab(tab));
            }
        });
    }
    {
        let actions = inputs.actions.clone();
        let syncing = inputs.syncing.clone();
        inputs.search.connect_search_changed(move |entry| {
            if !syncing.get() {
                let _ = actions.send(Action::Search(entry.text().to_string()));
            }
        });
    }
    {
        let actions = inputs.actions.clone();
        inputs.refresh_btn.connect_clicked(move |_| {
            let _ = actions.send(Action::Refresh);
        });
    }
    {
        let actions = inputs.actions.clone();
        inputs.new_contact_btn.connect_clicked(move |_| {
            let _ = actions.send(Action::EditContact(None));
        });
    }
    {
        let actions = inputs.actions.clone();
        inputs.new_group_btn.connect_clicked(move |_| {
            let _ = actions.send(Action::EditGroup(None));
        });
    }
    {
        let actions = inputs.actions.clone();
        let window = inputs.window.clone();
        inputs.import_btn.connect_clicked(move |_| {
            dialogs::choose_spreadsheet(&window, actions.clone())
        });
    }
}
