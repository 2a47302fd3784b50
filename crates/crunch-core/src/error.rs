use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrunchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Image '{name}' ({width}x{height}) cannot fit a {max_size}x{max_size} atlas")]
    ImageTooLarge {
        name: String,
        width: u32,
        height: u32,
        max_size: u32,
    },
    #[error("Not a recognized atlas file")]
    NotAtlas,
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),
    #[error("Truncated input: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("Missing required key '{0}'")]
    MissingKey(String),
    #[error("Malformed atlas document: {0}")]
    Malformed(String),
    #[error("Invalid alignment {0} (expected 64, 128, 256, 512, 1024, 2048 or 4096)")]
    InvalidAlignment(u16),
    #[error("Value {value} for '{field}' does not fit the on-disk field")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),
}

pub type Result<T> = std::result::Result<T, CrunchError>;
