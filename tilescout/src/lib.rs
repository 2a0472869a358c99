// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

#[path = "commands.rs"]
pub mod commands;

pub use commands::command_argument_builder;
pub use handlers::{
    enriched_output_path, expand_path, parse_url_line, resolve_format, scrape_options_from_args,
};
