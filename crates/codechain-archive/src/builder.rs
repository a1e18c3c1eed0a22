use std::fs;
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use codechain_sync::FileTree;
use tar::{Builder, EntryType, Header};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ArchiveError, ArchiveResult};
use crate::options::{ArchiveFormat, ArchiveOptions};

/// Result of writing an archive file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub files: usize,
    pub size_bytes: u64,
}

/// Serializes a [`FileTree`] into a zip, tar, or tar.zst archive.
pub struct ArchiveBuilder {
    options: ArchiveOptions,
}

impl ArchiveBuilder {
    pub fn new(options: ArchiveOptions) -> Self {
        Self { options }
    }

    pub fn with_defaults() -> Self {
        Self::new(ArchiveOptions::default())
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// `<name>.<extension>` for the configured format.
    pub fn file_name(&self, name: &str) -> String {
        format!("{name}.{}", self.options.format.extension())
    }

    /// Write `<dir>/<root>.<ext>` containing `tree` under the folder `root`.
    pub fn write_into_dir(&self, dir: &Path, root: &str, tree: &FileTree) -> ArchiveResult<ArchiveInfo> {
        self.write(&dir.join(self.file_name(root)), root, tree)
    }

    /// Write the archive to `path` atomically: either the complete archive
    /// appears under `path` or nothing does.
    pub fn write(&self, path: &Path, root: &str, tree: &FileTree) -> ArchiveResult<ArchiveInfo> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        // Dropped (and removed) on any early return.
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            self.write_to(&mut writer, root, tree)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        let size_bytes = temp.as_file().metadata()?.len();
        temp.persist(path)?;

        tracing::info!(
            path = %path.display(),
            files = tree.file_count(),
            size_bytes,
            "archive written"
        );
        Ok(ArchiveInfo {
            path: path.to_path_buf(),
            files: tree.file_count(),
            size_bytes,
        })
    }

    /// Build the archive in memory.
    pub fn build_to_vec(&self, root: &str, tree: &FileTree) -> ArchiveResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer, root, tree)?;
        Ok(buffer)
    }

    fn write_to<W: Write>(&self, mut writer: W, root: &str, tree: &FileTree) -> ArchiveResult<()> {
        validate_segment(root)?;
        match self.options.format {
            ArchiveFormat::Zip => {
                // ZipWriter needs Seek.
                let bytes = zip_tree(root, tree)?;
                writer.write_all(&bytes)?;
            }
            ArchiveFormat::Tar => {
                let mut builder = Builder::new(writer);
                append_tree(&mut builder, root, tree)?;
                builder
                    .into_inner()
                    .map_err(|e| ArchiveError::Tar(format!("finish: {e}")))?;
            }
            ArchiveFormat::TarZst => {
                let encoder = zstd::Encoder::new(writer, self.options.compression_level)
                    .map_err(|e| ArchiveError::Compression(format!("zstd encoder: {e}")))?;
                let mut builder = Builder::new(encoder);
                append_tree(&mut builder, root, tree)?;
                let encoder = builder
                    .into_inner()
                    .map_err(|e| ArchiveError::Tar(format!("finish: {e}")))?;
                encoder
                    .finish()
                    .map_err(|e| ArchiveError::Compression(format!("zstd finish: {e}")))?;
            }
        }
        Ok(())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn zip_tree(root: &str, tree: &FileTree) -> ArchiveResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.add_directory(format!("{root}/"), zip_options(CompressionMethod::Stored, 0o755))?;
    for dir in tree.directories() {
        zip.add_directory(format!("{root}/{dir}/"), zip_options(CompressionMethod::Stored, 0o755))?;
    }
    for (path, data) in tree.files() {
        zip.start_file(format!("{root}/{path}"), zip_options(CompressionMethod::Deflated, 0o644))?;
        zip.write_all(data)?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Entry options with the fixed 1980-01-01 DOS timestamp.
fn zip_options(method: CompressionMethod, mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(mode)
}

fn append_tree<W: Write>(builder: &mut Builder<W>, root: &str, tree: &FileTree) -> ArchiveResult<()> {
    append_directory(builder, &format!("{root}/"))?;
    for dir in tree.directories() {
        append_directory(builder, &format!("{root}/{dir}/"))?;
    }
    for (path, data) in tree.files() {
        append_file(builder, &format!("{root}/{path}"), data)?;
    }
    Ok(())
}

fn append_directory<W: Write>(builder: &mut Builder<W>, path: &str) -> ArchiveResult<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    header.set_mtime(0);
    builder
        .append_data(&mut header, path, std::io::empty())
        .map_err(|e| ArchiveError::Tar(format!("append '{path}': {e}")))
}

fn append_file<W: Write>(builder: &mut Builder<W>, path: &str, data: &[u8]) -> ArchiveResult<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    // append_data handles long names with GNU extension headers.
    builder
        .append_data(&mut header, path, data)
        .map_err(|e| ArchiveError::Tar(format!("append '{path}': {e}")))
}

fn validate_segment(root: &str) -> ArchiveResult<()> {
    if root.is_empty() || root == "." || root == ".." || root.contains('/') {
        return Err(ArchiveError::InvalidEntry {
            path: root.to_string(),
            reason: "root folder must be a single path segment".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::reader::ArchiveReader;

    fn sample_tree() -> FileTree {
        let mut tree = FileTree::new();
        tree.insert_file("README.md", Bytes::from_static(b"# demo"));
        tree.insert_file("src/main.rs", Bytes::from_static(b"fn main() {}"));
        tree.insert_file("src/empty.rs", Bytes::new());
        tree
    }

    #[test]
    fn file_name_uses_format_extension() {
        assert_eq!(ArchiveBuilder::with_defaults().file_name("demo"), "demo.zip");
        let tar = ArchiveBuilder::new(ArchiveOptions {
            format: ArchiveFormat::Tar,
            ..ArchiveOptions::default()
        });
        assert_eq!(tar.file_name("demo"), "demo.tar");
    }

    #[test]
    fn builds_are_deterministic() {
        for format in [ArchiveFormat::Zip, ArchiveFormat::Tar, ArchiveFormat::TarZst] {
            let builder = ArchiveBuilder::new(ArchiveOptions {
                format,
                ..ArchiveOptions::default()
            });
            let a = builder.build_to_vec("demo", &sample_tree()).unwrap();
            let b = builder.build_to_vec("demo", &sample_tree()).unwrap();
            assert_eq!(a, b, "{format} output differs");
        }
    }

    #[test]
    fn zip_entries_sit_under_root_folder() {
        let bytes = ArchiveBuilder::with_defaults().build_to_vec("demo", &sample_tree()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names[0], "demo/");
        assert!(names.iter().all(|n| n.starts_with("demo/")));
        assert!(names.contains(&"demo/src/".to_string()));
        assert!(names.contains(&"demo/src/main.rs".to_string()));
    }

    #[test]
    fn both_formats_read_back() {
        for format in [ArchiveFormat::Zip, ArchiveFormat::Tar, ArchiveFormat::TarZst] {
            let builder = ArchiveBuilder::new(ArchiveOptions {
                format,
                ..ArchiveOptions::default()
            });
            let bytes = builder.build_to_vec("demo", &sample_tree()).unwrap();
            let contents = ArchiveReader::read_bytes(&bytes).unwrap();
            assert_eq!(contents.root, "demo");
            assert!(contents.tree.same_files(&sample_tree()));
        }
    }

    #[test]
    fn write_into_dir_persists_under_final_name() {
        let dir = tempfile::tempdir().unwrap();
        let info = ArchiveBuilder::with_defaults()
            .write_into_dir(dir.path(), "demo", &sample_tree())
            .unwrap();
        assert_eq!(info.path, dir.path().join("demo.zip"));
        assert_eq!(info.files, 3);
        assert_eq!(info.size_bytes, fs::metadata(&info.path).unwrap().len());

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn failed_build_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("bad.zip");
        let err = ArchiveBuilder::with_defaults()
            .write(&target, "a/b", &sample_tree())
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidEntry { .. }));
        assert!(!target.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn long_paths_survive() {
        let mut tree = FileTree::new();
        let long = format!("{}/file.txt", "segment".repeat(30));
        tree.insert_file(long.clone(), Bytes::from_static(b"deep"));
        let bytes = ArchiveBuilder::with_defaults().build_to_vec("demo", &tree).unwrap();
        let contents = ArchiveReader::read_bytes(&bytes).unwrap();
        assert_eq!(contents.tree.get(&long).unwrap().as_ref(), b"deep");
    }
}
