pub mod chat;
pub mod models;
pub mod options;
pub mod serve;
