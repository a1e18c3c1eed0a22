use std::io::{Cursor, Read};
use std::path::Path;

use bytes::Bytes;
use codechain_sync::FileTree;
use tar::{Archive, EntryType};
use zip::ZipArchive;

use crate::error::{ArchiveError, ArchiveResult};

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const ZIP_MAGIC: [u8; 2] = *b"PK";

/// Archive contents with the root folder split off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveContents {
    pub root: String,
    pub tree: FileTree,
}

/// Reads archives produced by [`ArchiveBuilder`](crate::ArchiveBuilder).
pub struct ArchiveReader;

impl ArchiveReader {
    pub fn read_file(path: &Path) -> ArchiveResult<ArchiveContents> {
        let data = std::fs::read(path)?;
        Self::read_bytes(&data)
    }

    /// Parse an archive, detecting the format from its magic bytes.
    pub fn read_bytes(data: &[u8]) -> ArchiveResult<ArchiveContents> {
        if data.starts_with(&ZIP_MAGIC) {
            Self::read_zip(data)
        } else if data.starts_with(&ZSTD_MAGIC) {
            let decoder = zstd::Decoder::new(data)
                .map_err(|e| ArchiveError::Compression(format!("zstd decoder: {e}")))?;
            Self::read_tar(decoder)
        } else {
            Self::read_tar(data)
        }
    }

    fn read_zip(data: &[u8]) -> ArchiveResult<ArchiveContents> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut contents = Collector::default();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let path = file.name().trim_end_matches('/').to_string();
            if file.is_dir() {
                contents.directory(path)?;
            } else {
                let mut data = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut data)?;
                contents.file(path, data)?;
            }
        }
        contents.finish()
    }

    fn read_tar<R: Read>(reader: R) -> ArchiveResult<ArchiveContents> {
        let mut archive = Archive::new(reader);
        let mut contents = Collector::default();

        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.to_string_lossy().trim_end_matches('/').to_string();
            match entry.header().entry_type() {
                EntryType::Directory => contents.directory(path)?,
                EntryType::Regular => {
                    let mut data = Vec::with_capacity(entry.size() as usize);
                    entry.read_to_end(&mut data)?;
                    contents.file(path, data)?;
                }
                other => {
                    return Err(ArchiveError::InvalidEntry {
                        path,
                        reason: format!("unexpected entry type {other:?}"),
                    });
                }
            }
        }
        contents.finish()
    }
}

/// Splits entry paths into the shared root folder and a tree-relative path.
#[derive(Default)]
struct Collector {
    root: Option<String>,
    tree: FileTree,
}

impl Collector {
    /// Path below the root folder, `None` for the root entry itself.
    fn relative(&mut self, path: &str) -> ArchiveResult<Option<String>> {
        let (head, rest) = match path.split_once('/') {
            Some((head, rest)) => (head, Some(rest.to_string())),
            None => (path, None),
        };
        match &self.root {
            Some(expected) if expected != head => Err(ArchiveError::InvalidEntry {
                path: path.to_string(),
                reason: format!("outside root folder {expected:?}"),
            }),
            Some(_) => Ok(rest),
            None => {
                self.root = Some(head.to_string());
                Ok(rest)
            }
        }
    }

    fn directory(&mut self, path: String) -> ArchiveResult<()> {
        if let Some(rest) = self.relative(&path)? {
            self.tree.insert_directory(rest);
        }
        Ok(())
    }

    fn file(&mut self, path: String, data: Vec<u8>) -> ArchiveResult<()> {
        match self.relative(&path)? {
            Some(rest) => {
                self.tree.insert_file(rest, Bytes::from(data));
                Ok(())
            }
            None => Err(ArchiveError::InvalidEntry {
                path,
                reason: "file outside any root folder".into(),
            }),
        }
    }

    fn finish(self) -> ArchiveResult<ArchiveContents> {
        let root = self.root.ok_or_else(|| ArchiveError::InvalidEntry {
            path: String::new(),
            reason: "archive is empty".into(),
        })?;
        Ok(ArchiveContents { root, tree: self.tree })
    }
}
