pub mod codec;
pub mod command;

pub use codec::*;
pub use command::*;

use thiserror::Error;

pub const WELCOME_BANNER: &str = "Hello user!\n";
pub const HELP_HINT: &str = "Enter --help for support info\n";

/// One line per verb, in the order the server has always printed them.
pub const HELP_TEXT: &[&str] = &[
    "\tls          view all files from current directory\n",
    "\tmkdir       create directory\n",
    "\ttouch       create file\n",
    "\tcd          move through the folder tree\n",
    "\trm          remove object\n",
    "\tcopy        copy file\n",
    "\tcat         show file content\n",
];

pub const LINE_TOO_LONG: &str = "Line is too long\n";

/// The prompt sent after every processed line.
pub fn prompt(client_addr: &std::net::SocketAddr) -> String {
    format!("{}: ", client_addr)
}

#[derive(Debug, Error)]
pub enum TfshError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TfshResult<T> = Result<T, TfshError>;
