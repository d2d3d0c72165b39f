#[path = "project/cli_surface.rs"]
mod cli_surface;
#[path = "project/config_schema.rs"]
mod config_schema;
