pub mod app;
pub mod cache;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod locate;
pub mod output;
pub mod runtime;
pub mod selector;

pub use app::run;
pub use output::OutputFormat;
