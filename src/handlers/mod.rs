pub mod broadcast;
pub mod command;
pub mod download;
pub mod send_message;
