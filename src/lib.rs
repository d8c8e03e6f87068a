pub mod arguments;
pub mod cache;
pub mod config;
pub mod logger;
pub mod upstream;
pub mod webserver;
