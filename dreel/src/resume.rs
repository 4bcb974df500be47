//! Works out how much of an interrupted picture asset can be kept.
//!
//! Every frame is re-read from the asset and hashed against its index record
//! so a frame cut short by a crash is never trusted. Any failure along the way
//! only means the frame has to be encoded again, nothing here is an error.
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;
use serde::Serialize;

use dcore::hash;

use crate::frame_index::{frame_eyes, Eyes, FrameIndex};
use crate::job::{self, Progress};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Check every recorded frame from the start, stopping at the first bad one
    #[default]
    Full,
    /// Walk back from the last recorded frame to the last good one
    Tail,
}

impl std::str::FromStr for VerifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(VerifyMode::Full),
            "tail" => Ok(VerifyMode::Tail),
            _ => Err(format!("unknown verify mode: {}", s)),
        }
    }
}

/// First frame of the picture asset at `asset` that still has to be written.
pub fn check_existing_picture(
    asset: &Path,
    index: &Path,
    stereo: bool,
    mode: VerifyMode,
    progress: Option<&dyn Progress>,
) -> u64 {
    job::sub(progress, "Checking existing image data");

    let mut asset_file = match File::open(asset) {
        Ok(f) => f,
        Err(e) => {
            debug!("No existing picture asset {} ({})", asset.display(), e);
            return 0;
        }
    };
    let mut index = match FrameIndex::open_for_read(index, stereo) {
        Some(i) => i,
        None => return 0,
    };

    let first_missing = first_missing_frame(&mut asset_file, &mut index, mode, progress);
    info!("Existing picture asset {} is good up to frame {}", asset.display(), first_missing);
    first_missing
}

pub fn first_missing_frame<A, I>(
    asset: &mut A,
    index: &mut FrameIndex<I>,
    mode: VerifyMode,
    progress: Option<&dyn Progress>,
) -> u64
where
    A: Read + Seek,
    I: Read + Seek,
{
    let eyes_per_frame = frame_eyes(index.stereo()).len() as u64;
    let records = match index.records() {
        Ok(0) | Err(_) => return 0,
        Ok(r) => r,
    };
    let last = (records - 1) / eyes_per_frame;
    let len = match asset.seek(SeekFrom::End(0)) {
        Ok(len) => len,
        Err(e) => {
            debug!("Can not size existing picture asset ({})", e);
            return 0;
        }
    };

    match mode {
        VerifyMode::Full => {
            for frame in 0..=last {
                job::set_progress(progress, frame as f32 / (last + 1) as f32);
                if !frame_ok(asset, len, index, frame) {
                    return frame;
                }
            }
            last + 1
        }
        VerifyMode::Tail => {
            let mut candidate = last;
            let mut ok = frame_ok(asset, len, index, candidate);
            while candidate > 0 && !ok {
                candidate -= 1;
                job::set_progress(progress, (last - candidate) as f32 / (last + 1) as f32);
                ok = frame_ok(asset, len, index, candidate);
            }
            if ok {
                candidate + 1
            } else {
                candidate
            }
        }
    }
}

fn frame_ok<A: Read + Seek, I: Read + Seek>(asset: &mut A, len: u64, index: &mut FrameIndex<I>, frame: u64) -> bool {
    frame_eyes(index.stereo()).iter().all(|eyes| eye_ok(asset, len, index, frame, *eyes))
}

/// `len` is the length of the asset, records reaching past it are never read.
fn eye_ok<A: Read + Seek, I: Read + Seek>(
    asset: &mut A,
    len: u64,
    index: &mut FrameIndex<I>,
    frame: u64,
    eyes: Eyes,
) -> bool {
    let info = match index.read(frame, eyes) {
        Ok(info) => info,
        Err(e) => {
            debug!("Existing frame {} {:?} has no usable record ({})", frame, eyes, e);
            return false;
        }
    };

    match info.offset.checked_add(info.size) {
        Some(end) if end <= len => (),
        _ => {
            info!("Existing frame {} is incomplete ({} bytes at {}, asset has {})", frame, info.size, info.offset, len);
            return false;
        }
    }

    let mut data = vec![0u8; info.size as usize];
    let read = asset
        .seek(SeekFrom::Start(info.offset))
        .and_then(|_| asset.read_exact(&mut data));
    if let Err(e) = read {
        info!("Existing frame {} is incomplete ({})", frame, e);
        return false;
    }

    if hash::hash_bytes(&data) != info.hash {
        info!("Existing frame {} failed hash check", frame);
        return false;
    }
    true
}

/// Byte offset where frame `first_missing` starts, the end of the frame
/// before it.
pub fn resume_offset<I: Read + Seek>(index: &mut FrameIndex<I>, first_missing: u64) -> std::io::Result<u64> {
    if first_missing == 0 {
        return Ok(0);
    }

    let last_eye = match frame_eyes(index.stereo()).last() {
        Some(eyes) => *eyes,
        None => return Ok(0),
    };
    Ok(index.read(first_missing - 1, last_eye)?.end())
}

#[cfg(test)]
mod test_resume {
    use super::*;
    use crate::asset::PictureAssetWriter;
    use crate::frame_index::FrameInfo;
    use crate::job::test_progress::Recorder;
    use std::fs::{self, OpenOptions};
    use std::io::{Cursor, Write};
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        asset: PathBuf,
        index: PathBuf,
    }

    fn frame(n: u8, eyes: Eyes) -> Vec<u8> {
        let tag = match eyes {
            Eyes::Both => 0,
            Eyes::Left => 1,
            Eyes::Right => 2,
        };
        (0..100u8).map(|i| i.wrapping_mul(n).wrapping_add(n).wrapping_add(tag)).collect()
    }

    fn write_frames(frames: u8, stereo: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let asset = dir.path().join("video").join("asset.mxf");
        let index = dir.path().join("info").join("asset");

        let mut writer = PictureAssetWriter::create(&asset, stereo).unwrap();
        let mut frame_index = FrameIndex::open_for_write(&index, stereo).unwrap();
        for n in 0..frames {
            for eyes in frame_eyes(stereo) {
                let info = writer.write(&frame(n, *eyes)).unwrap();
                frame_index.write(n as u64, *eyes, &info).unwrap();
            }
        }
        writer.finalize().unwrap();

        Fixture { _dir: dir, asset, index }
    }

    fn corrupt(path: &Path, offset: u64) {
        let mut data = fs::read(path).unwrap();
        data[offset as usize] ^= 0xff;
        fs::write(path, data).unwrap();
    }

    fn check(f: &Fixture, stereo: bool, mode: VerifyMode) -> u64 {
        check_existing_picture(&f.asset, &f.index, stereo, mode, None)
    }

    #[test]
    fn ten_frames_then_corrupt_seventh() {
        let f = write_frames(10, false);
        assert_eq!(check(&f, false, VerifyMode::Full), 10);
        assert_eq!(check(&f, false, VerifyMode::Tail), 10);

        let seventh = FrameIndex::open_for_read(&f.index, false).unwrap().read(7, Eyes::Both).unwrap();
        corrupt(&f.asset, seventh.offset);

        assert_eq!(check(&f, false, VerifyMode::Full), 7);
    }

    #[test]
    fn truncated_last_frame() {
        let f = write_frames(10, false);

        // Crash half way through frame 9
        let file = OpenOptions::new().write(true).open(&f.asset).unwrap();
        file.set_len(950).unwrap();

        assert_eq!(check(&f, false, VerifyMode::Full), 9);
        assert_eq!(check(&f, false, VerifyMode::Tail), 9);
    }

    #[test]
    fn trailing_garbage_does_not_matter() {
        let f = write_frames(5, false);
        let last = FrameIndex::open_for_read(&f.index, false).unwrap().read(4, Eyes::Both).unwrap();
        corrupt(&f.asset, last.offset + 10);

        let mut file = OpenOptions::new().append(true).open(&f.asset).unwrap();
        file.write_all(&[0xaa; 12345]).unwrap();

        assert_eq!(check(&f, false, VerifyMode::Full), 4);
        assert_eq!(check(&f, false, VerifyMode::Tail), 4);
    }

    #[test]
    fn tail_only_looks_at_the_end() {
        let f = write_frames(10, false);
        let third = FrameIndex::open_for_read(&f.index, false).unwrap().read(3, Eyes::Both).unwrap();
        corrupt(&f.asset, third.offset);

        assert_eq!(check(&f, false, VerifyMode::Tail), 10);
        assert_eq!(check(&f, false, VerifyMode::Full), 3);
    }

    #[test]
    fn nothing_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let asset = dir.path().join("asset.mxf");
        let index = dir.path().join("index");

        assert_eq!(check_existing_picture(&asset, &index, false, VerifyMode::Full, None), 0);

        // An asset without its index is not trusted either
        fs::write(&asset, [0u8; 100]).unwrap();
        assert_eq!(check_existing_picture(&asset, &index, false, VerifyMode::Full, None), 0);
    }

    #[test]
    fn empty_index() {
        let f = write_frames(0, false);
        assert_eq!(check(&f, false, VerifyMode::Full), 0);
        assert_eq!(check(&f, false, VerifyMode::Tail), 0);
    }

    #[test]
    fn single_good_frame() {
        let f = write_frames(1, false);
        assert_eq!(check(&f, false, VerifyMode::Full), 1);
        assert_eq!(check(&f, false, VerifyMode::Tail), 1);
    }

    #[test]
    fn single_bad_frame() {
        let f = write_frames(1, false);
        corrupt(&f.asset, 0);

        assert_eq!(check(&f, false, VerifyMode::Full), 0);
        assert_eq!(check(&f, false, VerifyMode::Tail), 0);
    }

    #[test]
    fn stereo_all_good() {
        let f = write_frames(4, true);
        assert_eq!(check(&f, true, VerifyMode::Full), 4);
        assert_eq!(check(&f, true, VerifyMode::Tail), 4);
    }

    #[test]
    fn stereo_left_only_is_redone() {
        let f = write_frames(3, true);

        // Frame 3 got its left eye before the crash
        let mut writer = PictureAssetWriter::resume(&f.asset, true, fs::metadata(&f.asset).unwrap().len(), 3).unwrap();
        let mut index = FrameIndex::open_for_write(&f.index, true).unwrap();
        let info = writer.write(&frame(3, Eyes::Left)).unwrap();
        index.write(3, Eyes::Left, &info).unwrap();
        writer.finalize().unwrap();

        assert_eq!(check(&f, true, VerifyMode::Full), 3);
        assert_eq!(check(&f, true, VerifyMode::Tail), 3);
    }

    #[test]
    fn stereo_bad_right_eye() {
        let f = write_frames(3, true);
        let right = FrameIndex::open_for_read(&f.index, true).unwrap().read(1, Eyes::Right).unwrap();
        corrupt(&f.asset, right.offset);

        assert_eq!(check(&f, true, VerifyMode::Full), 1);
    }

    #[test]
    fn record_past_end_of_asset() {
        let f = write_frames(3, false);
        let mut index = FrameIndex::open_for_write(&f.index, false).unwrap();
        let good = index.read(1, Eyes::Both).unwrap();

        index
            .write(1, Eyes::Both, &FrameInfo { size: u32::MAX as u64, ..good })
            .unwrap();
        index
            .write(2, Eyes::Both, &FrameInfo { offset: u64::MAX, ..good })
            .unwrap();
        index.flush().unwrap();

        assert_eq!(check(&f, false, VerifyMode::Full), 1);
        assert_eq!(check(&f, false, VerifyMode::Tail), 1);
    }

    #[test]
    fn resume_offsets() {
        let f = write_frames(3, true);
        let mut index = FrameIndex::open_for_read(&f.index, true).unwrap();

        assert_eq!(resume_offset(&mut index, 0).unwrap(), 0);
        assert_eq!(resume_offset(&mut index, 1).unwrap(), 200);
        assert_eq!(resume_offset(&mut index, 3).unwrap(), 600);
    }

    #[test]
    fn in_memory() {
        let data = b"0123456789".to_vec();
        let mut index = FrameIndex::new(Cursor::new(Vec::new()), false);
        index
            .write(
                0,
                Eyes::Both,
                &FrameInfo {
                    offset: 0,
                    size: 10,
                    hash: hash::hash_bytes(&data),
                },
            )
            .unwrap();

        let mut asset = Cursor::new(data);
        assert_eq!(first_missing_frame(&mut asset, &mut index, VerifyMode::Full, None), 1);
    }

    #[test]
    fn reports_progress() {
        let f = write_frames(4, false);
        let recorder = Recorder::default();
        check_existing_picture(&f.asset, &f.index, false, VerifyMode::Full, Some(&recorder));

        assert_eq!(*recorder.stages.borrow(), vec!["Checking existing image data".to_string()]);
        assert_eq!(recorder.fractions.borrow().len(), 4);
    }

    #[test]
    fn verify_mode_from_str() {
        assert_eq!("full".parse::<VerifyMode>().unwrap(), VerifyMode::Full);
        assert_eq!("Tail".parse::<VerifyMode>().unwrap(), VerifyMode::Tail);
        assert!("sideways".parse::<VerifyMode>().is_err());
    }
}
