pub mod cache;
pub mod commands;
pub mod export;
pub mod fetch;
pub mod pack;
pub mod query;
pub mod sources;
pub mod xlsx;
