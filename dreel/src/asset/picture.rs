use std::path::Path;

use dcore::hash;

use crate::asset::{AssetFile, Location};
use crate::error::ReelError;
use crate::frame_index::FrameInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Real,
    Fake,
}

/// Appends compressed frames to a picture asset.
///
/// Stereoscopic assets hold left then right for every frame, each as its own
/// unit.
pub struct PictureAssetWriter {
    file: AssetFile,
    stereo: bool,
    units: u64,
    mode: Option<WriteMode>,
}

impl PictureAssetWriter {
    pub fn create(path: &Path, stereo: bool) -> Result<Self, ReelError> {
        Ok(PictureAssetWriter {
            file: AssetFile::create(path)?,
            stereo,
            units: 0,
            mode: None,
        })
    }

    /// Continue an asset whose first `frames` frames end at byte `at`.
    pub fn resume(path: &Path, stereo: bool, at: u64, frames: u64) -> Result<Self, ReelError> {
        Ok(PictureAssetWriter {
            file: AssetFile::resume(path, at)?,
            stereo,
            units: frames * if stereo { 2 } else { 1 },
            mode: if at > 0 { Some(WriteMode::Real) } else { None },
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn stereo(&self) -> bool {
        self.stereo
    }

    /// Complete frames in the asset, resumed ones included.
    pub fn frames(&self) -> u64 {
        if self.stereo {
            self.units / 2
        } else {
            self.units
        }
    }

    fn set_mode(&mut self, mode: WriteMode) -> Result<(), ReelError> {
        match self.mode {
            Some(current) if current != mode => Err(ReelError::MixedWrites),
            _ => {
                self.mode = Some(mode);
                Ok(())
            }
        }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<FrameInfo, ReelError> {
        if data.len() as u64 > u32::MAX as u64 {
            return Err(ReelError::FrameTooLarge(data.len() as u64));
        }
        self.set_mode(WriteMode::Real)?;

        let location = self.file.append(data)?;
        self.units += 1;

        Ok(FrameInfo {
            offset: location.offset,
            size: location.size,
            hash: hash::hash_bytes(data),
        })
    }

    /// Write the previous unit again, it gets its own location.
    pub fn repeat_write(&mut self, previous: &[u8]) -> Result<FrameInfo, ReelError> {
        self.write(previous)
    }

    /// Account for a frame of `size` bytes without writing it.
    pub fn fake_write(&mut self, size: u64) -> Result<Location, ReelError> {
        self.set_mode(WriteMode::Fake)?;

        let location = self.file.skip(size)?;
        self.units += 1;
        Ok(location)
    }

    pub fn finalize(&mut self) -> Result<bool, ReelError> {
        self.file.finalize()
    }
}
