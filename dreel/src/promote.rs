//! Moving finished assets from the working directory into the package.
//!
//! The picture asset is hard linked so a later run can keep resuming from the
//! working copy, sound and immersive audio are simply renamed.
use std::fs::{self, File};
use std::io;
use std::path::Path;

use log::{debug, error, info, warn};

use dcore::buf::copy_with_progress;

use crate::error::ReelError;
use crate::job::{self, Progress};

pub const DEFAULT_COPY_BUFFER: usize = 1024 * 1024;

pub fn picture_filename(id: &str) -> String {
    format!("j2c_{}.mxf", id)
}

pub fn sound_filename(id: &str) -> String {
    format!("pcm_{}.mxf", id)
}

pub fn atmos_filename(id: &str) -> String {
    format!("atmos_{}.mxf", id)
}

/// Hard link `from` to `to`, copying when the link can not be made.
pub fn promote_picture(from: &Path, to: &Path, buffer: usize, progress: Option<&dyn Progress>) -> Result<(), ReelError> {
    promote_picture_with(from, to, buffer, progress, |f, t| fs::hard_link(f, t))
}

pub fn promote_picture_with<L>(
    from: &Path,
    to: &Path,
    buffer: usize,
    progress: Option<&dyn Progress>,
    link: L,
) -> Result<(), ReelError>
where
    L: FnOnce(&Path, &Path) -> io::Result<()>,
{
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    // An older package may still have a file here
    if to.symlink_metadata().is_ok() {
        debug!("Removing old {}", to.display());
        fs::remove_file(to)?;
    }

    match link(from, to) {
        Ok(()) => {
            debug!("Hard linked {} to {}", from.display(), to.display());
            Ok(())
        }
        Err(e) => {
            warn!("Hard-link of {} failed ({}); copying instead", from.display(), e);
            job::sub(progress, "Copying video file into DCP");

            copy_file(from, to, buffer, progress).map_err(|source| {
                error!("Failed to copy video file from {} to {} ({})", from.display(), to.display(), source);
                ReelError::Copy {
                    from: from.to_path_buf(),
                    to: to.to_path_buf(),
                    source,
                }
            })
        }
    }
}

fn copy_file(from: &Path, to: &Path, buffer: usize, progress: Option<&dyn Progress>) -> io::Result<()> {
    let mut reader = File::open(from)?;
    let total = reader.metadata()?.len();
    let mut writer = File::create(to)?;

    let copied = copy_with_progress(&mut reader, &mut writer, buffer, total, |f| job::set_progress(progress, f))?;
    writer.sync_all()?;

    debug!("Copied {} bytes from {} to {}", copied, from.display(), to.display());
    Ok(())
}

/// Rename `from` to `to`, they need to be on the same filesystem.
pub fn promote_move(from: &Path, to: &Path) -> Result<(), ReelError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::rename(from, to).map_err(|source| ReelError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        code: source.raw_os_error(),
        source,
    })?;

    debug!("Moved {} to {}", from.display(), to.display());
    Ok(())
}

/// Give `path` its own storage if a package still shares it through a hard
/// link, so writing to it leaves the package alone.
///
/// Returns whether a copy was made.
#[cfg(unix)]
pub fn break_hard_link(path: &Path) -> Result<bool, ReelError> {
    use std::os::unix::fs::MetadataExt;

    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    if meta.nlink() <= 1 {
        return Ok(false);
    }

    info!("Breaking hard link on {} ({} links)", path.display(), meta.nlink());
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    let mut source = File::open(path)?;
    io::copy(&mut source, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(true)
}

#[cfg(not(unix))]
pub fn break_hard_link(_path: &Path) -> Result<bool, ReelError> {
    Ok(false)
}
