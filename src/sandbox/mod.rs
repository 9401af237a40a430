pub mod ops;
pub mod validator;

pub use ops::*;
pub use validator::*;

// Result strings sent back to clients. The protocol has no error channel, so
// every failure is one of these lines.
pub const NO_SUCH_FILE_OR_DIRECTORY: &str = "There is no such file or directory";
pub const NO_SUCH_DIRECTORY: &str = "There is no such directory";
pub const FILE_DOES_NOT_EXIST: &str = "File does not exist";
pub const SOURCE_DOES_NOT_EXIST: &str = "Source path does not exist";
pub const SOURCE_NOT_A_FILE: &str = "Source path is not a file";
pub const DESTINATION_DOES_NOT_EXIST: &str = "Destination path does not exist";
pub const DIRECTORY_NOT_EMPTY: &str = "Directory is not empty";
pub const FILE_DELETED: &str = "File was deleted";
pub const COPY_CREATED: &str = "Copy was created";
