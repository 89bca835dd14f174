//! Zip archive extraction and repacking.
//!
//! Mind-map files are zip containers. Pre-processing unpacks one into a
//! scratch directory, rewrites its content and packs it back up. Scratch
//! directories live inside an [`Arena`] that is unique to each conversion run
//! and removed when the arena is dropped.

use std::{
    cell::Cell,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipArchive, ZipWriter, result::ZipError, write::SimpleFileOptions};

/// Errors that can occur while extracting or repacking an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The archive file could not be opened or created.
    #[error("failed to open archive {}", path.display())]
    Open {
        /// The archive path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The archive is not a valid zip file, or an entry could not be read or
    /// written.
    #[error("invalid or corrupt zip archive")]
    Zip(#[from] ZipError),
    /// The scratch directory could not be walked.
    #[error("failed to walk scratch directory")]
    Walk(#[from] walkdir::Error),
    /// A file could not be copied into or out of the archive.
    #[error("failed to copy archive entry")]
    Io(#[from] io::Error),
}

/// Extracts every entry of a zip archive into `dir`.
///
/// Entries whose names would escape `dir` are skipped.
///
/// Returns the number of files written.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or is not a valid zip
/// file, or if an entry cannot be written.
pub fn extract(archive_path: &Path, dir: &Path) -> Result<usize, ArchiveError> {
    let file = File::open(archive_path).map_err(|source| ArchiveError::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file)?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(entry_path) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "skipping archive entry with unsafe path");
            continue;
        };
        let output_path = dir.join(entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&output_path)?;
        } else {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut output = File::create(&output_path)?;
            io::copy(&mut entry, &mut output)?;
            count += 1;
        }
    }

    tracing::debug!(archive = %archive_path.display(), files = count, "extracted archive");
    Ok(count)
}

/// Packs every file below `dir` into a new deflated zip archive.
///
/// Entry names are the file paths relative to `dir`, joined with `/`, in
/// sorted order. An existing file at `archive_path` is replaced.
///
/// Returns the number of files written.
///
/// # Errors
///
/// Returns an error if the directory cannot be walked, a file cannot be read,
/// or the archive cannot be written.
pub fn repack(dir: &Path, archive_path: &Path) -> Result<usize, ArchiveError> {
    let file = File::create(archive_path).map_err(|source| ArchiveError::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };

        archive.start_file(entry_name(relative), options)?;
        let mut input = File::open(entry.path())?;
        io::copy(&mut input, &mut archive)?;
        count += 1;
    }
    archive.finish()?;

    tracing::debug!(archive = %archive_path.display(), files = count, "repacked archive");
    Ok(count)
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Scratch space for a single conversion run.
///
/// Every arena is a freshly created, uniquely named temporary directory, so
/// concurrent runs never see each other's files. The directory and everything
/// in it is removed when the arena is dropped, whichever way the run ends.
#[derive(Debug)]
pub struct Arena {
    dir: TempDir,
    next: Cell<usize>,
}

impl Arena {
    /// Creates a new arena in the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("xmind2testlink-")
            .tempdir()?;
        tracing::debug!(path = %dir.path().display(), "created scratch arena");
        Ok(Self {
            dir,
            next: Cell::new(0),
        })
    }

    /// The root of the arena.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Creates a new, empty directory inside the arena.
    ///
    /// Each call returns a distinct directory, even for the same label.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn scratch_dir(&self, label: &str) -> io::Result<PathBuf> {
        let n = self.next.get();
        self.next.set(n + 1);
        let path = self.path().join(format!("{label}-{n}"));
        fs::create_dir(&path)?;
        Ok(path)
    }

    /// A path for a file named `name` at the root of the arena.
    #[must_use]
    pub fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path().join(name)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_then_repack_preserves_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let original = tmp.path().join("original.zip");
        fixtures::write_zip(
            &original,
            &[
                ("content.json", b"[]"),
                ("nested/dir/file.txt", b"hello"),
            ],
        );

        let unpacked = tmp.path().join("unpacked");
        assert_eq!(extract(&original, &unpacked).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(unpacked.join("nested/dir/file.txt")).unwrap(),
            "hello"
        );

        let repacked = tmp.path().join("repacked.zip");
        assert_eq!(repack(&unpacked, &repacked).unwrap(), 2);

        let mut archive = ZipArchive::new(File::open(&repacked).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, ["content.json", "nested/dir/file.txt"]);

        let mut entry = archive.by_name("nested/dir/file.txt").unwrap();
        let mut content = String::new();
        io::Read::read_to_string(&mut entry, &mut content).unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn extract_missing_archive_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let error = extract(&tmp.path().join("missing.zip"), tmp.path()).unwrap_err();
        assert!(matches!(error, ArchiveError::Open { .. }));
    }

    #[test]
    fn extract_rejects_non_zip_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("not-a.zip");
        fs::write(&path, "plain text").unwrap();

        let error = extract(&path, &tmp.path().join("out")).unwrap_err();
        assert!(matches!(error, ArchiveError::Zip(_)));
    }

    #[test]
    fn arenas_are_unique_and_removed_on_drop() {
        let first = Arena::new().unwrap();
        let second = Arena::new().unwrap();
        assert_ne!(first.path(), second.path());

        let a = first.scratch_dir("extract").unwrap();
        let b = first.scratch_dir("extract").unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());

        let root = first.path().to_path_buf();
        drop(first);
        assert!(!root.exists());
    }
}
