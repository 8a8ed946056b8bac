use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use theater_common::{Result, TheaterError};
use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zip a session directory next to itself as `<parent>/<name>.zip`.
///
/// Entries are named relative to the parent, so they unpack into a folder
/// named after the session.
pub async fn package_session(session_dir: &Path) -> Result<PathBuf> {
    let session_dir = session_dir.to_path_buf();
    tokio::task::spawn_blocking(move || write_archive(&session_dir))
        .await
        .map_err(|e| TheaterError::Archive(format!("packaging task failed: {e}")))?
}

fn write_archive(session_dir: &Path) -> Result<PathBuf> {
    let (parent, name) = match (session_dir.parent(), session_dir.file_name()) {
        (Some(parent), Some(name)) => (parent, name.to_string_lossy().into_owned()),
        _ => {
            return Err(TheaterError::Archive(format!(
                "{} has no parent directory",
                session_dir.display()
            )));
        }
    };
    let archive_path = parent.join(format!("{name}.zip"));

    let mut zip = ZipWriter::new(File::create(&archive_path)?);
    let mut entries = 0usize;

    for entry in WalkDir::new(session_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| TheaterError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(parent)
            .map_err(|e| TheaterError::Archive(e.to_string()))?;
        let entry_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        zip.start_file(entry_name, deflated())
            .map_err(|e| TheaterError::Archive(e.to_string()))?;
        io::copy(&mut File::open(entry.path())?, &mut zip)?;
        entries += 1;
    }
    zip.finish()
        .map_err(|e| TheaterError::Archive(e.to_string()))?;

    info!(target: "app.packager", archive = %archive_path.display(), entries, "session packaged");
    Ok(archive_path)
}

fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}
