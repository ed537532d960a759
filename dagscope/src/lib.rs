// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export the helpers the binary and tests lean on
pub use handlers::{
    DATABASE_FILE, DEFAULT_DATA_DIR, apply_overrides, database_path, display_value,
    load_config, open_database, resolve_data_dir, resolve_format, timeout_from_secs,
};
