//! Archive builder for CodeChain clones.
//!
//! A reconstructed [`FileTree`](codechain_sync::FileTree) is serialized into a
//! single archive (zip by default, or tar, optionally zstd-compressed) with
//! every entry nested under a root folder named after the repository. Archives are written to a
//! temporary file next to the destination and renamed into place, so a failed
//! clone never leaves a partial file under the final name.
//!
//! Entries carry a fixed timestamp and fixed modes, so the same tree always
//! yields the same bytes.

pub mod builder;
pub mod error;
pub mod options;
pub mod reader;

pub use builder::{ArchiveBuilder, ArchiveInfo};
pub use error::{ArchiveError, ArchiveResult};
pub use options::{ArchiveFormat, ArchiveOptions};
pub use reader::{ArchiveContents, ArchiveReader};
