use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::asset::{AssetFile, Location};
use crate::error::ReelError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtmosMetadata {
    pub first_frame: u32,
    pub max_channel_count: u32,
    pub max_object_count: u32,
    pub atmos_version: u32,
}

/// Immersive audio, one opaque block per picture frame.
pub struct ImmersiveAssetWriter {
    file: AssetFile,
    metadata: AtmosMetadata,
    blocks: u64,
}

impl ImmersiveAssetWriter {
    pub fn create(path: &Path, metadata: AtmosMetadata) -> Result<Self, ReelError> {
        Ok(ImmersiveAssetWriter {
            file: AssetFile::create(path)?,
            metadata,
            blocks: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn metadata(&self) -> AtmosMetadata {
        self.metadata
    }

    pub fn write(&mut self, block: &[u8]) -> Result<Location, ReelError> {
        let location = self.file.append(block)?;
        self.blocks += 1;
        Ok(location)
    }

    pub fn duration(&self) -> i64 {
        self.blocks as i64
    }

    pub fn finalize(&mut self) -> Result<bool, ReelError> {
        self.file.finalize()
    }
}

#[cfg(test)]
mod test_atmos_writer {
    use super::*;

    fn metadata() -> AtmosMetadata {
        AtmosMetadata {
            first_frame: 0,
            max_channel_count: 10,
            max_object_count: 118,
            atmos_version: 1,
        }
    }

    #[test]
    fn blocks_are_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ImmersiveAssetWriter::create(&dir.path().join("atmos.mxf"), metadata()).unwrap();

        assert_eq!(writer.write(&[0u8; 64]).unwrap(), Location { offset: 0, size: 64 });
        assert_eq!(writer.write(&[0u8; 32]).unwrap(), Location { offset: 64, size: 32 });
        assert_eq!(writer.duration(), 2);
        assert_eq!(writer.metadata(), metadata());
        assert!(writer.finalize().unwrap());
    }

    #[test]
    fn nothing_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ImmersiveAssetWriter::create(&dir.path().join("atmos.mxf"), metadata()).unwrap();

        assert!(!writer.finalize().unwrap());
        assert!(!writer.finalize().unwrap());
    }
}
