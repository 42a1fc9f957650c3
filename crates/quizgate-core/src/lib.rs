pub mod config;
pub mod evaluate;
pub mod ipc;
pub mod labels;
pub mod question;
pub mod timeline;
pub mod trigger;
