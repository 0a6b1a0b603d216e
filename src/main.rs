use adw::prelude::*;
use adw::Application;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let app = Application::builder()
        .application_id("com.example.WhatspyGtk")
        .build();
    app.connect_activate(|app| {
        whatspy_gtk::app::build_ui(app);
    });
    app.run();
}
