//! # Archive Transport
//!
//! Ships a directory of schema sources as a single string: the files are zipped in memory and
//! the zip stream is rendered as standard base64.
//!
//! [`pack`] skips hidden entries (names starting with `.`) and symbolic links, and emits entries
//! in sorted order so the same directory always packs to the same archive layout.
//!
//! [`unpack`] treats the archive as untrusted input. Every entry name is resolved lexically
//! against the destination before anything is written. Parent directories are then created one
//! component at a time from the canonical destination, and any existing component that is a
//! symlink rejects the entry, so neither `..` segments nor pre-existing symlinks can place a file
//! or a directory outside the destination.
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{self, Cursor, Read, Write},
    path::{Component, Path, PathBuf},
};
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("Archive entry '{0}' escapes the destination directory")]
    PathTraversal(String),

    #[error("I/O error on '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Archive is not valid base64")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("Archive is not a valid zip stream")]
    CorruptArchive(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackOptions {
    /// Descend into subdirectories instead of packing only the immediate files. On by default,
    /// schemas importing each other across directories need the whole tree.
    pub recursive: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self { recursive: true }
    }
}

enum Entry {
    Directory(String),
    File { name: String, path: PathBuf },
}

/// Packs the files under `dir` into a base64 zip string.
///
/// # Arguments
///
/// * `dir` - The directory to pack.
/// * `options` - Whether to descend into subdirectories.
///
/// # Returns
///
/// * `Ok(String)` - The base64 rendering of the zip stream.
/// * `Err(ArchiveError)` - If `dir` is not a directory or a file cannot be read.
pub fn pack(dir: &Path, options: &PackOptions) -> Result<String, ArchiveError> {
    if !dir.is_dir() {
        return Err(ArchiveError::NotADirectory(dir.to_path_buf()));
    }

    let mut entries = Vec::new();
    collect_entries(dir, "", options.recursive, &mut entries)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let file_options = SimpleFileOptions::default();
    let mut files = 0usize;

    for entry in &entries {
        match entry {
            Entry::Directory(name) => {
                writer
                    .add_directory(format!("{name}/"), file_options)
                    .map_err(|e| zip_io(dir, e))?;
            }
            Entry::File { name, path } => {
                let content = fs::read(path).map_err(|source| ArchiveError::Io {
                    path: path.clone(),
                    source,
                })?;
                writer
                    .start_file(name.as_str(), file_options)
                    .map_err(|e| zip_io(path, e))?;
                writer.write_all(&content).map_err(|source| ArchiveError::Io {
                    path: path.clone(),
                    source,
                })?;
                files += 1;
            }
        }
    }

    let bytes = writer.finish().map_err(|e| zip_io(dir, e))?.into_inner();

    tracing::info!(dir = %dir.display(), files, bytes = bytes.len(), "packed directory");

    Ok(STANDARD.encode(bytes))
}

fn collect_entries(
    dir: &Path,
    prefix: &str,
    recursive: bool,
    entries: &mut Vec<Entry>,
) -> Result<(), ArchiveError> {
    let io_err = |source: io::Error| ArchiveError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut children = fs::read_dir(dir)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let path = child.path();
        let file_name = child.file_name();

        let Some(file_name) = file_name.to_str() else {
            tracing::warn!(path = %path.display(), "skipping entry with a non UTF-8 name");
            continue;
        };
        if file_name.starts_with('.') {
            continue;
        }

        let name = if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{prefix}/{file_name}")
        };

        let file_type = child.file_type().map_err(|source| ArchiveError::Io {
            path: path.clone(),
            source,
        })?;

        if file_type.is_symlink() {
            tracing::warn!(path = %path.display(), "skipping symlink");
        } else if file_type.is_dir() {
            if recursive {
                entries.push(Entry::Directory(name.clone()));
                collect_entries(&path, &name, recursive, entries)?;
            }
        } else if file_type.is_file() {
            entries.push(Entry::File { name, path });
        }
    }

    Ok(())
}

/// Unpacks a base64 zip string into `dest`.
///
/// Directory entries are created, parent directories are created on demand and existing files
/// are overwritten.
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - The paths of the files written, in archive order.
/// * `Err(ArchiveError)` - If the text is not base64, the bytes are not a zip stream, an entry
///   would land outside `dest`, or a filesystem operation fails.
pub fn unpack(text: &str, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let bytes = STANDARD.decode(text.trim())?;
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    fs::create_dir_all(dest).map_err(|source| ArchiveError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    let canonical_dest = canonicalize(dest)?;

    let mut written = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let relative = resolve_entry(&name)?;

        if entry.is_dir() {
            // `./` and friends name the destination itself.
            if relative.as_os_str().is_empty() {
                continue;
            }
            create_dirs(&canonical_dest, &relative, &name)?;
            continue;
        }

        let Some(file_name) = relative.file_name() else {
            return Err(ArchiveError::PathTraversal(name));
        };
        let parent = relative.parent().unwrap_or(Path::new(""));
        let parent = create_dirs(&canonical_dest, parent, &name)?;
        let target = parent.join(file_name);

        // Writing through an existing link would follow it.
        if is_symlink(&target) {
            return Err(ArchiveError::PathTraversal(name));
        }

        let mut content = Vec::new();
        entry.read_to_end(&mut content).map_err(|source| ArchiveError::Io {
            path: target.clone(),
            source,
        })?;
        fs::write(&target, content).map_err(|source| ArchiveError::Io {
            path: target.clone(),
            source,
        })?;

        written.push(dest.join(&relative));
    }

    tracing::info!(dest = %dest.display(), files = written.len(), "unpacked archive");

    Ok(written)
}

/// Resolves an entry name to a normalized path relative to the destination.
fn resolve_entry(name: &str) -> Result<PathBuf, ArchiveError> {
    let mut resolved = PathBuf::new();

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(ArchiveError::PathTraversal(name.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::PathTraversal(name.to_string()));
            }
        }
    }

    Ok(resolved)
}

/// Creates `relative` under `root` one component at a time, refusing to step through symlinks.
///
/// `relative` holds only normal components, so the walk never leaves `root` as long as every
/// existing component is a real directory.
fn create_dirs(root: &Path, relative: &Path, name: &str) -> Result<PathBuf, ArchiveError> {
    let mut current = root.to_path_buf();

    for component in relative.components() {
        current.push(component);

        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(ArchiveError::PathTraversal(name.to_string()));
            }
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(ArchiveError::Io {
                    path: current,
                    source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
                });
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir(&current).map_err(|source| ArchiveError::Io {
                    path: current.clone(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(ArchiveError::Io {
                    path: current,
                    source,
                });
            }
        }
    }

    Ok(current)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}

fn canonicalize(path: &Path) -> Result<PathBuf, ArchiveError> {
    fs::canonicalize(path).map_err(|source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn zip_io(path: &Path, err: zip::result::ZipError) -> ArchiveError {
    ArchiveError::Io {
        path: path.to_path_buf(),
        source: io::Error::other(err),
    }
}
