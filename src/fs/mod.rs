//! FileSystem abstraction for testable file access

mod mock;
mod real;
mod r#trait;

pub use mock::MockFileSystem;
pub use r#trait::{FileMetadata, FileSystem, FileType};
pub use real::RealFileSystem;
