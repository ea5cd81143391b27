pub mod app;
pub mod cache;
pub mod catalogue;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metadata;
pub mod notice;
pub mod query;
pub mod warehouse;
