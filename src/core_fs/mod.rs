pub mod error;
pub mod filesystem;
pub mod path;

pub use error::FsError;
pub use filesystem::{DirEntryInfo, FileSystem};
pub use path::VirtualPath;
