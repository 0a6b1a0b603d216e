use adw::prelude::*;
use adw::Application;
use gtk4 as gtk;

use crate::api::client::ApiClient;
use crate::app::AppState;
use crate::error::ConsoleError;

/// Asks for the console server URL when none is configured yet.
pub fn show_login_window(app: &Application) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("WhatsApp Console")
        .default_width(420)
        .default_height(220)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Connect to the console server"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let server_entry = gtk::Entry::new();
    server_entry.set_placeholder_text(Some("Server URL (e.g. http://localhost:8000)"));
    server_entry.set_hexpand(true);
    root.append(&server_entry);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    root.append(&status);

    let connect_btn = gtk::Button::with_label("Connect");
    connect_btn.add_css_class("suggested-action");
    connect_btn.set_halign(gtk::Align::End);
    root.append(&connect_btn);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    header.set_title_widget(Some(&gtk::Label::new(Some("WhatsApp Console"))));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_connect = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let server_entry = server_entry.clone();
        let connect_btn = connect_btn.clone();
        move || {
            let url = crate::utils::normalize_url(&server_entry.text());
            if url.is_empty() {
                overlay.add_toast(adw::Toast::new("Please enter the server URL."));
                return;
            }

            status.set_label("Connecting…");
            connect_btn.set_sensitive(false);

            let url_for_async = url.clone();
            let rx: glib::Receiver<Result<u16, ConsoleError>> =
                crate::utils::run_async_to_main(async move {
                    let client = ApiClient::new(&url_for_async)?;
                    client.ping().await
                });

            let status_label = status.clone();
            let app2 = app.clone();
            let window2 = window.clone();
            let overlay2 = overlay.clone();
            let button = connect_btn.clone();
            rx.attach(None, move |res| {
                button.set_sensitive(true);
                match res {
                    Ok(code) => {
                        log::info!("server {} answered with HTTP {}", url, code);
                        let mut st = AppState::load();
                        st.base_url = url.clone();
                        if let Err(e) = st.save() {
                            let msg = format!("Failed to save settings: {}", e);
                            overlay2.add_toast(adw::Toast::new(&msg));
                        }
                        crate::ui::main_window::show_main_window(&app2, st);
                        window2.close();
                    }
                    Err(err) => {
                        log::warn!("server check failed: {}", err);
                        status_label.set_label("Connection failed");
                        let msg = err.user_message("Could not reach the server. Check the URL.");
                        overlay2.add_toast(adw::Toast::new(&msg));
                    }
                }
                glib::ControlFlow::Continue
            });
        }
    };

    use std::rc::Rc;
    let on_connect: Rc<dyn Fn()> = Rc::new(on_connect);
    {
        let on_connect = on_connect.clone();
        connect_btn.connect_clicked(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        server_entry.connect_activate(move |_| (on_connect)());
    }

    window.present();
}
