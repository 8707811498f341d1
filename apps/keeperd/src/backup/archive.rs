//! Whole-directory zip archives: recursive, deflate-compressed, paths stored relative to the
//! archived directory. Both directions are blocking and run on the blocking pool.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("archive not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("archive already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("path cannot be stored in an archive: {}", .0.display())]
    UnsupportedPath(PathBuf),

    #[error("archive entry escapes the target directory: {0}")]
    UnsafeEntry(String),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: usize,
    pub size_bytes: u64,
}

/// Zips every regular file under `source`. Directories are implied by file paths, symlinks
/// are not followed, and anything under `exclude` is skipped. The archive is written next to
/// `dest` and renamed into place only once complete.
pub fn create_archive(
    source: &Path,
    dest: &Path,
    exclude: &[PathBuf],
) -> Result<ArchiveSummary, ArchiveError> {
    if !source.is_dir() {
        return Err(ArchiveError::NotADirectory(source.to_path_buf()));
    }
    if dest.exists() {
        return Err(ArchiveError::AlreadyExists(dest.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let partial = partial_path(dest);
    let result = write_archive(source, &partial, exclude);
    match result {
        Ok(files) => {
            fs::rename(&partial, dest)?;
            let size_bytes = fs::metadata(dest)?.len();
            debug!(files, size_bytes, archive = %dest.display(), "archive written");
            Ok(ArchiveSummary { files, size_bytes })
        }
        Err(err) => {
            let _ = fs::remove_file(&partial);
            Err(err)
        }
    }
}

fn write_archive(source: &Path, partial: &Path, exclude: &[PathBuf]) -> Result<usize, ArchiveError> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(partial)?));
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0;
    let walker = WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let path = entry.path();
            path != partial && !exclude.iter().any(|skip| path.starts_with(skip))
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = match entry_name(source, path) {
            Ok(name) => name,
            Err(ArchiveError::UnsupportedPath(skipped)) => {
                warn!(path = %skipped.display(), "path has no UTF-8 name, leaving it out");
                continue;
            }
            Err(err) => return Err(err),
        };
        let metadata = entry.metadata()?;

        let mut options = base.large_file(metadata.len() >= u32::MAX as u64);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(metadata.permissions().mode());
        }

        zip.start_file(name, options)?;
        let mut reader = BufReader::new(File::open(path)?);
        io::copy(&mut reader, &mut zip)?;
        files += 1;
    }

    zip.finish()?.flush()?;
    Ok(files)
}

/// `/`-separated path relative to the archive root.
fn entry_name(root: &Path, path: &Path) -> Result<String, ArchiveError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ArchiveError::UnsupportedPath(path.to_path_buf()))?;
    let parts = relative
        .components()
        .map(|part| part.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ArchiveError::UnsupportedPath(path.to_path_buf()))?;
    Ok(parts.join("/"))
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Replaces `target` with the contents of `archive`.
///
/// The archive is opened and fully extracted into a staging directory beside `target`
/// before anything in `target` is touched, so an unreadable or corrupt archive leaves
/// the existing directory intact.
pub fn restore_archive(archive: &Path, target: &Path) -> Result<ArchiveSummary, ArchiveError> {
    if !archive.is_file() {
        return Err(ArchiveError::NotFound(archive.to_path_buf()));
    }
    let size_bytes = fs::metadata(archive)?.len();
    let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;

    let staging = staging_path(target);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let files = match extract_into(&mut zip, &staging) {
        Ok(files) => files,
        Err(err) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }
    };

    if target.exists() {
        fs::remove_dir_all(target)?;
    }
    fs::rename(&staging, target)?;
    Ok(ArchiveSummary { files, size_bytes })
}

fn extract_into<R>(zip: &mut ZipArchive<R>, dir: &Path) -> Result<usize, ArchiveError>
where
    R: io::Read + io::Seek,
{
    let mut files = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
        let out_path = dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&out_path)?);
        io::copy(&mut entry, &mut out)?;
        out.flush()?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))?;
        }
        files += 1;
    }
    Ok(files)
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".restoring");
    PathBuf::from(name)
}
