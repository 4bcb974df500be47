//! Reel manifest of a package, `REELS.ltvc` in the package directory.
//!
//! `AHDR`, `MHDR`, one `REEL` per reel in order, `AEND` holding the reel
//! count. This is what the packaging step wraps into the final composition.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::ReelError;
use crate::ltvc::{LtvcBuilder, LtvcReaderRaw, VERSION};
use crate::reel::Reel;

pub const MANIFEST_FILENAME: &str = "REELS.ltvc";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ManifestHeader {
    /// RFC 3339
    pub issued: String,
    pub reels: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub header: ManifestHeader,
    pub reels: Vec<Reel>,
}

pub fn manifest_path(package_dir: &Path) -> PathBuf {
    package_dir.join(MANIFEST_FILENAME)
}

/// Write `reels` into `package_dir`, returns the path of the manifest.
pub fn write_manifest(package_dir: &Path, reels: &[Reel]) -> Result<PathBuf, ReelError> {
    let issued = OffsetDateTime::now_utc().format(&Rfc3339)?;

    std::fs::create_dir_all(package_dir)?;
    let path = manifest_path(package_dir);

    let mut builder = LtvcBuilder::new(BufWriter::new(File::create(&path)?));
    builder.write_ahdr(VERSION)?;
    builder.write_entry(
        b"MHDR",
        &ManifestHeader {
            issued,
            reels: reels.len() as u32,
        },
    )?;
    for reel in reels.iter() {
        builder.write_entry(b"REEL", reel)?;
    }
    builder.finish(reels.len() as u32)?;

    info!("Wrote manifest of {} reels to {}", reels.len(), path.display());
    Ok(path)
}

pub fn read_manifest(path: &Path) -> Result<Manifest, ReelError> {
    let mut reader = LtvcReaderRaw::new(BufReader::new(File::open(path)?));
    reader.expect_ahdr(VERSION)?;

    let header: ManifestHeader = reader.expect(b"MHDR")?.decode()?;
    // The count is only trusted once AEND agrees with it
    let mut reels: Vec<Reel> = Vec::new();
    for _ in 0..header.reels {
        reels.push(reader.expect(b"REEL")?.decode()?);
    }

    let count = reader.expect(b"AEND")?.as_u32()?;
    if count != header.reels {
        return Err(ReelError::Decode {
            path: path.to_path_buf(),
            what: "reel manifest",
            reason: format!("header says {} reels, ending says {}", header.reels, count),
        });
    }

    Ok(Manifest { header, reels })
}

#[cfg(test)]
mod test_manifest {
    use super::*;
    use crate::asset::{new_asset_id, AssetKind, ReelAsset, TrackId};
    use crate::film::Marker;
    use crate::ltvc::LtvcError;
    use dcore::time::{DcpTime, TimePeriod};

    fn reel(from: i64, to: i64) -> Reel {
        let period = TimePeriod::new(DcpTime::from_frames(from, 24), DcpTime::from_frames(to, 24));
        let frames = to - from;
        let mut reel = Reel::new(period, 24);

        let mut picture = ReelAsset::new(new_asset_id(), AssetKind::Picture { stereo: false }, 24, frames)
            .with_file("/dcp/j2c.mxf");
        picture.hash = Some(dcore::hash::hash_bytes(b"picture"));
        reel.add(picture).unwrap();

        let mut markers = ReelAsset::new(new_asset_id(), AssetKind::Markers, 24, frames);
        markers.markers.insert(Marker::FFOC, DcpTime::new(0));
        reel.add(markers).unwrap();

        reel.add(ReelAsset::new(new_asset_id(), AssetKind::ClosedCaption(TrackId::new("CC", "en")), 24, frames))
            .unwrap();
        reel
    }

    #[test]
    fn write_read() {
        let dir = tempfile::tempdir().unwrap();
        let reels = vec![reel(0, 100), reel(100, 250)];

        let path = write_manifest(&dir.path().join("dcp"), &reels).unwrap();
        let manifest = read_manifest(&path).unwrap();

        assert_eq!(manifest.reels, reels);
        assert_eq!(manifest.header.reels, 2);
        assert!(OffsetDateTime::parse(&manifest.header.issued, &Rfc3339).is_ok());
    }

    #[test]
    fn no_reels() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), &[]).unwrap();

        assert!(read_manifest(&path).unwrap().reels.is_empty());
    }

    #[test]
    fn absurd_reel_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = manifest_path(dir.path());

        let mut builder = LtvcBuilder::new(File::create(&path).unwrap());
        builder.write_ahdr(VERSION).unwrap();
        builder
            .write_entry(
                b"MHDR",
                &ManifestHeader {
                    issued: "2026-10-18T00:00:00Z".to_string(),
                    reels: u32::MAX,
                },
            )
            .unwrap();
        builder.write_entry(b"REEL", &reel(0, 10)).unwrap();
        builder.finish(1).unwrap();

        assert!(matches!(read_manifest(&path), Err(ReelError::Ltvc(LtvcError::Unexpected { .. }))));
    }

    #[test]
    fn issue_date_error_message() {
        let e = ReelError::from(time::error::Format::InsufficientTypeInformation);
        let message = e.to_string();

        assert!(message.starts_with("could not format the manifest issue date"));
        assert!(!message.contains("is not a valid"));
    }

    #[test]
    fn missing_reel() {
        let dir = tempfile::tempdir().unwrap();
        let path = manifest_path(dir.path());

        let mut builder = LtvcBuilder::new(File::create(&path).unwrap());
        builder.write_ahdr(VERSION).unwrap();
        builder
            .write_entry(
                b"MHDR",
                &ManifestHeader {
                    issued: "2026-10-18T00:00:00Z".to_string(),
                    reels: 2,
                },
            )
            .unwrap();
        builder.write_entry(b"REEL", &reel(0, 10)).unwrap();
        builder.finish(2).unwrap();

        assert!(matches!(read_manifest(&path), Err(ReelError::Ltvc(LtvcError::Unexpected { .. }))));
    }
}
