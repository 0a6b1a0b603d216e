pub mod chat_view;
pub mod dialogs;
pub mod login;
pub mod main_window;
pub mod sidebar;
