//! Frame index side file.
//!
//! One fixed size record per (frame, eye) describing where the compressed
//! frame lives inside the picture asset and what its digest is. Records are
//! addressed by position so they can be written in any order and rewritten.
//!
//! | Offset | Type     | Name   | Description |
//! | -----: | -------- | ------ | ----------- |
//! | 0      | u64      | offset | Byte offset of the frame in the picture asset (native endian) |
//! | 8      | u32      | size   | Byte size of the frame (native endian) |
//! | 12     | [u8; 4]  | -      | Zero |
//! | 16     | [u8; 32] | hash   | Digest of the frame bytes |
//!
//! 2D frame `n` is record `n`. Stereoscopic frame `n` is records `2n` (left)
//! and `2n + 1` (right).
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{ByteOrder, NativeEndian};
use log::debug;
use serde::Deserialize;
use serde::Serialize;

use dcore::hash::Digest;

use crate::error::ReelError;

pub const RECORD_SIZE: u64 = 48;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Eyes {
    Both,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub offset: u64,
    pub size: u64,
    pub hash: Digest,
}

impl FrameInfo {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Byte position of the record for `frame` seen by `eyes`.
///
/// Panics if `eyes` does not suit the index, that is a bug in the caller.
pub fn record_position(frame: u64, eyes: Eyes, stereo: bool) -> u64 {
    match (eyes, stereo) {
        (Eyes::Both, false) => frame * RECORD_SIZE,
        (Eyes::Left, true) => frame * RECORD_SIZE * 2,
        (Eyes::Right, true) => frame * RECORD_SIZE * 2 + RECORD_SIZE,
        (eyes, stereo) => panic!("{:?} record requested from a {} frame index", eyes, if stereo { "3D" } else { "2D" }),
    }
}

/// The eye records that together make up one frame.
pub fn frame_eyes(stereo: bool) -> &'static [Eyes] {
    if stereo {
        &[Eyes::Left, Eyes::Right]
    } else {
        &[Eyes::Both]
    }
}

pub struct FrameIndex<F> {
    inner: F,
    stereo: bool,
}

impl FrameIndex<File> {
    /// Open an index for writing, creating it if there is none yet.
    ///
    /// Existing records are kept, a resumed run rewrites them in place.
    pub fn open_for_write(path: &Path, stereo: bool) -> Result<Self, ReelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
        debug!("Opened frame index {} for writing", path.display());

        Ok(FrameIndex::new(file, stereo))
    }

    /// Open an existing index, `None` when there is nothing usable.
    pub fn open_for_read(path: &Path, stereo: bool) -> Option<Self> {
        match File::open(path) {
            Ok(file) => Some(FrameIndex::new(file, stereo)),
            Err(e) => {
                debug!("No frame index at {} ({})", path.display(), e);
                None
            }
        }
    }
}

impl<F> FrameIndex<F> {
    pub fn new(inner: F, stereo: bool) -> Self {
        FrameIndex { inner, stereo }
    }

    pub fn stereo(&self) -> bool {
        self.stereo
    }

    pub fn position(&self, frame: u64, eyes: Eyes) -> u64 {
        record_position(frame, eyes, self.stereo)
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: Seek> FrameIndex<F> {
    /// Number of complete records in the index.
    pub fn records(&mut self) -> std::io::Result<u64> {
        Ok(self.inner.seek(SeekFrom::End(0))? / RECORD_SIZE)
    }
}

impl<F: Write + Seek> FrameIndex<F> {
    pub fn write(&mut self, frame: u64, eyes: Eyes, info: &FrameInfo) -> Result<(), ReelError> {
        let size = u32::try_from(info.size).map_err(|_| ReelError::FrameTooLarge(info.size))?;

        let mut record = [0u8; RECORD_SIZE as usize];
        NativeEndian::write_u64(&mut record[0..8], info.offset);
        NativeEndian::write_u32(&mut record[8..12], size);
        record[16..48].copy_from_slice(info.hash.as_bytes());

        self.inner.seek(SeekFrom::Start(self.position(frame, eyes)))?;
        self.inner.write_all(&record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<F: Read + Seek> FrameIndex<F> {
    pub fn read(&mut self, frame: u64, eyes: Eyes) -> std::io::Result<FrameInfo> {
        let mut record = [0u8; RECORD_SIZE as usize];
        self.inner.seek(SeekFrom::Start(self.position(frame, eyes)))?;
        self.inner.read_exact(&mut record)?;

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&record[16..48]);

        Ok(FrameInfo {
            offset: NativeEndian::read_u64(&record[0..8]),
            size: NativeEndian::read_u32(&record[8..12]) as u64,
            hash: Digest::from(hash),
        })
    }
}
