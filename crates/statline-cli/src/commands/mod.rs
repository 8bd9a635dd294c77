pub mod ask;
pub mod catalog;
pub mod chat;
pub mod history;
pub mod render;
pub mod validate;
