#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod image_rewrite;
pub mod logging;
pub mod paginate;
pub mod proxy;
pub mod sanitize;
pub mod series;
pub mod server;
pub mod upstream;
