//! Subtitle and closed caption assets.
//!
//! Entries are collected in memory while the reel is written, fonts are only
//! folded in when the reel is assembled. The asset is then written out in one
//! go as an LTVC file:
//!
//! `AHDR`, `THDR`, one `FONT` per embedded font, one `TEXT` per entry, `AEND`
//! holding the entry count.
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use serde::Serialize;

use dcore::hash::{self, Digest};
use dcore::time::DcpTime;

use crate::asset::TrackId;
use crate::error::ReelError;
use crate::ltvc::{LtvcBuilder, LtvcError, LtvcReaderRaw, VERSION};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub from: DcpTime,
    pub to: DcpTime,
    pub text: String,
}

impl TextEntry {
    pub fn new(from: DcpTime, to: DcpTime, text: &str) -> Self {
        TextEntry {
            from,
            to,
            text: text.to_string(),
        }
    }
}

/// A font to embed into the text assets of a reel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontRef {
    pub id: String,
    pub file: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFont {
    pub id: String,
    pub data: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct TextHeader {
    id: String,
    track: Option<TrackId>,
    title: String,
    language: String,
    edit_rate: u32,
    intrinsic_duration: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAsset {
    pub id: String,
    /// `None` for open subtitles
    pub track: Option<TrackId>,
    pub title: String,
    pub language: String,
    pub edit_rate: u32,
    pub intrinsic_duration: i64,
    pub fonts: Vec<EmbeddedFont>,
    pub entries: Vec<TextEntry>,
}

impl TextAsset {
    pub fn new(id: String, track: Option<TrackId>, title: &str, language: &str, edit_rate: u32) -> Self {
        TextAsset {
            id,
            track,
            title: title.to_string(),
            language: language.to_string(),
            edit_rate,
            intrinsic_duration: 0,
            fonts: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, entry: TextEntry) {
        self.entries.push(entry);
    }

    /// Embed the bytes of `font`, replacing any font already using its id.
    pub fn add_font(&mut self, font: &FontRef) -> Result<(), ReelError> {
        let data = fs::read(&font.file)?;
        debug!("Embedding font {} ({} bytes) into {}", font.id, data.len(), self.id);

        self.fonts.retain(|f| f.id != font.id);
        self.fonts.push(EmbeddedFont {
            id: font.id.clone(),
            data,
        });
        Ok(())
    }

    /// Package file name of the asset.
    pub fn filename(&self) -> String {
        match self.track {
            Some(_) => format!("ccap_{}.ltvc", self.id),
            None => format!("sub_{}.ltvc", self.id),
        }
    }

    /// Write the asset to `path` and return the digest of the file.
    pub fn write(&self, path: &Path) -> Result<Digest, ReelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut builder = LtvcBuilder::new(BufWriter::new(File::create(path)?));
        builder.write_ahdr(VERSION)?;
        builder.write_entry(
            b"THDR",
            &TextHeader {
                id: self.id.clone(),
                track: self.track.clone(),
                title: self.title.clone(),
                language: self.language.clone(),
                edit_rate: self.edit_rate,
                intrinsic_duration: self.intrinsic_duration,
            },
        )?;
        for font in self.fonts.iter() {
            builder.write_entry(b"FONT", font)?;
        }
        for entry in self.entries.iter() {
            builder.write_entry(b"TEXT", entry)?;
        }
        builder.finish(self.entries.len() as u32)?;

        debug!("Wrote text asset {} with {} entries", path.display(), self.entries.len());
        Ok(hash::hash_file(path, |_| {})?)
    }

    pub fn read(path: &Path) -> Result<TextAsset, ReelError> {
        let mut reader = LtvcReaderRaw::new(BufReader::new(File::open(path)?));
        reader.expect_ahdr(VERSION)?;

        let header: TextHeader = reader.expect(b"THDR")?.decode()?;
        let mut asset = TextAsset {
            id: header.id,
            track: header.track,
            title: header.title,
            language: header.language,
            edit_rate: header.edit_rate,
            intrinsic_duration: header.intrinsic_duration,
            fonts: Vec::new(),
            entries: Vec::new(),
        };

        loop {
            let entry = match reader.next() {
                Some(entry) => entry?,
                None => return Err(LtvcError::Unexpected {
                    expected: "AEND".to_string(),
                    found: "end of stream".to_string(),
                }
                .into()),
            };

            match &entry.typ {
                b"FONT" => asset.fonts.push(entry.decode()?),
                b"TEXT" => asset.entries.push(entry.decode()?),
                b"AEND" => {
                    let count = entry.as_u32()?;
                    if count as usize != asset.entries.len() {
                        return Err(ReelError::Decode {
                            path: path.to_path_buf(),
                            what: "text asset",
                            reason: format!("{} entries recorded, {} found", count, asset.entries.len()),
                        });
                    }
                    return Ok(asset);
                }
                other => {
                    return Err(LtvcError::Unexpected {
                        expected: "FONT, TEXT or AEND".to_string(),
                        found: String::from_utf8_lossy(other).into_owned(),
                    }
                    .into())
                }
            }
        }
    }
}
