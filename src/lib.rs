pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod invitations;
pub mod likes;
pub mod mailer;
pub mod matches;
pub mod state;
pub mod store;
pub mod time_fmt;
pub mod toasts;
pub mod users;
