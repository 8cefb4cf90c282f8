pub mod busy;
pub mod config;
pub mod download;
pub mod http;
pub mod runtime;
pub mod security;
pub mod session;
