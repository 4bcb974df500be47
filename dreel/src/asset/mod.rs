//! Asset writers and the asset handle that reels are composed from.
//!
//! Every writer is a plain sequential appender over one file. They are driven
//! by a single thread in frame order, reordering completed frames is up to the
//! caller.
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use dcore::hash::Digest;
use dcore::time::DcpTime;

use crate::error::ReelError;
use crate::film::Marker;

pub mod atmos;
pub mod picture;
pub mod sound;
pub mod text;

pub use atmos::{AtmosMetadata, ImmersiveAssetWriter};
pub use picture::PictureAssetWriter;
pub use sound::{AudioBuffers, SoundAssetWriter};
pub use text::{FontRef, TextAsset, TextEntry};

/// Where a unit ended up inside its asset file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub offset: u64,
    pub size: u64,
}

/// Identity of a closed caption track.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId {
    pub name: String,
    pub language: String,
}

impl TrackId {
    pub fn new(name: &str, language: &str) -> Self {
        TrackId {
            name: name.to_string(),
            language: language.to_string(),
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.language)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Picture { stereo: bool },
    Sound,
    Subtitle,
    ClosedCaption(TrackId),
    Atmos,
    Markers,
}

impl AssetKind {
    /// Whether an asset of `other` kind would take the same place in a reel.
    ///
    /// Mono and stereo pictures share the picture slot, captions only share
    /// a slot with the same track.
    pub fn same_slot(&self, other: &AssetKind) -> bool {
        match (self, other) {
            (AssetKind::ClosedCaption(a), AssetKind::ClosedCaption(b)) => a == b,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Picture { stereo: false } => write!(f, "picture"),
            AssetKind::Picture { stereo: true } => write!(f, "stereo picture"),
            AssetKind::Sound => write!(f, "sound"),
            AssetKind::Subtitle => write!(f, "subtitle"),
            AssetKind::ClosedCaption(track) => write!(f, "closed caption {}", track),
            AssetKind::Atmos => write!(f, "atmos"),
            AssetKind::Markers => write!(f, "markers"),
        }
    }
}

/// Handle to one asset as it is cited by a reel.
///
/// Durations are in frames at `edit_rate`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReelAsset {
    pub id: String,
    pub kind: AssetKind,
    pub file: Option<PathBuf>,
    pub edit_rate: u32,
    pub intrinsic_duration: i64,
    pub entry_point: i64,
    pub duration: Option<i64>,
    pub hash: Option<Digest>,
    pub key_id: Option<String>,

    /// Reel relative, only used by [`AssetKind::Markers`]
    pub markers: BTreeMap<Marker, DcpTime>,
}

impl ReelAsset {
    pub fn new(id: String, kind: AssetKind, edit_rate: u32, intrinsic_duration: i64) -> Self {
        ReelAsset {
            id,
            kind,
            file: None,
            edit_rate,
            intrinsic_duration,
            entry_point: 0,
            duration: None,
            hash: None,
            key_id: None,
            markers: BTreeMap::new(),
        }
    }

    pub fn with_file<P: Into<PathBuf>>(mut self, file: P) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn actual_duration(&self) -> i64 {
        self.duration.unwrap_or(self.intrinsic_duration - self.entry_point)
    }
}

/// Fresh identifier for an asset that has no content derived one.
pub fn new_asset_id() -> String {
    Uuid::new_v4().to_string()
}

/// Sequential cursor over one asset file shared by all the writers.
pub(crate) struct AssetFile {
    path: PathBuf,
    file: Option<File>,
    cursor: u64,
    finalized: Option<bool>,
}

impl AssetFile {
    pub(crate) fn create(path: &Path) -> Result<Self, ReelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        debug!("Created asset {}", path.display());

        Ok(AssetFile {
            path: path.to_path_buf(),
            file: Some(file),
            cursor: 0,
            finalized: None,
        })
    }

    /// Reopen an existing asset, dropping everything from `at` onwards.
    pub(crate) fn resume(path: &Path, at: u64) -> Result<Self, ReelError> {
        let mut file = OpenOptions::new().write(true).open(path)?;
        file.set_len(at)?;
        file.seek(SeekFrom::Start(at))?;
        debug!("Resuming asset {} at byte {}", path.display(), at);

        Ok(AssetFile {
            path: path.to_path_buf(),
            file: Some(file),
            cursor: at,
            finalized: None,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn cursor(&self) -> u64 {
        self.cursor
    }

    fn open(&mut self) -> Result<&mut File, ReelError> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(ReelError::Sealed(self.path.clone())),
        }
    }

    pub(crate) fn append(&mut self, data: &[u8]) -> Result<Location, ReelError> {
        self.open()?.write_all(data)?;

        let location = Location {
            offset: self.cursor,
            size: data.len() as u64,
        };
        self.cursor += location.size;
        Ok(location)
    }

    /// Move the cursor on without writing anything.
    pub(crate) fn skip(&mut self, size: u64) -> Result<Location, ReelError> {
        self.open()?;

        let location = Location {
            offset: self.cursor,
            size,
        };
        self.cursor += size;
        Ok(location)
    }

    /// Seal the file, returns whether it holds anything.
    pub(crate) fn finalize(&mut self) -> Result<bool, ReelError> {
        if let Some(wrote) = self.finalized {
            return Ok(wrote);
        }

        if let Some(mut file) = self.file.take() {
            file.flush()?;
            // Skipped bytes at the end still have to exist
            if file.metadata()?.len() < self.cursor {
                file.set_len(self.cursor)?;
            }
        }

        let wrote = self.cursor > 0;
        debug!("Finalized asset {} with {} bytes", self.path.display(), self.cursor);
        self.finalized = Some(wrote);
        Ok(wrote)
    }
}
