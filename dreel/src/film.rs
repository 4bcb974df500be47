//! Read-only view of the film that the reel writer needs.
//!
//! The project model itself lives elsewhere; this is only the narrow set of
//! accessors the core queries, plus the path conventions derived from them.
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use dcore::hash;
use dcore::time::{DcpTime, TimePeriod};

/// Content key for encrypted packages.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Key(pub [u8; 16]);

impl Key {
    /// Identifier recorded against encrypted assets, never the key itself.
    pub fn id(&self) -> String {
        hash::hash_bytes(&self.0).to_hex()[..32].to_string()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.id())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Marker {
    /// First frame of composition
    FFOC,
    /// Last frame of composition
    LFOC,
    /// First frame of title credits
    FFTC,
    /// Last frame of title credits
    LFTC,
    /// First frame of intermission
    FFOI,
    /// Last frame of intermission
    LFOI,
    /// First frame of end credits
    FFEC,
    /// Last frame of end credits
    LFEC,
    /// First frame of moving credits
    FFMC,
    /// Last frame of moving credits
    LFMC,
}

pub trait Film {
    fn name(&self) -> String;
    fn video_frame_rate(&self) -> u32;
    fn frame_size(&self) -> (u32, u32);
    fn audio_channels(&self) -> u16;
    fn audio_frame_rate(&self) -> u32;
    fn three_d(&self) -> bool;
    fn encrypted(&self) -> bool;
    fn key(&self) -> Option<Key>;
    fn subtitle_language(&self) -> Option<String>;
    fn markers(&self) -> BTreeMap<Marker, DcpTime>;

    /// Directory holding the working files of the film.
    fn directory(&self) -> PathBuf;

    /// Name of the package directory inside [`Film::directory`].
    fn dcp_name(&self) -> String;

    /// Everything that affects the picture of `period`, as one string.
    ///
    /// Two runs with the same summary produce the same picture so they share
    /// the same working asset, which is what makes resuming possible.
    fn content_summary(&self, period: TimePeriod) -> String;

    fn video_identifier(&self, period: TimePeriod) -> String {
        hash::hash_bytes(self.content_summary(period).as_bytes()).to_hex()[..32].to_string()
    }

    fn internal_video_asset_dir(&self) -> PathBuf {
        self.directory().join("video")
    }

    fn internal_video_asset_filename(&self, period: TimePeriod) -> String {
        format!("{}_{}_{}.mxf", self.video_identifier(period), period.from, period.to)
    }

    /// Frame index side file of the picture asset for `period`.
    fn info_file(&self, period: TimePeriod) -> PathBuf {
        self.directory()
            .join("info")
            .join(format!("{}_{}_{}", self.video_identifier(period), period.from, period.to))
    }

    fn package_dir(&self) -> PathBuf {
        self.directory().join(self.dcp_name())
    }
}

/// Plain settings backed [`Film`].
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FilmSettings {
    pub name: String,
    pub directory: PathBuf,
    pub dcp_name: String,
    pub video_frame_rate: u32,
    pub frame_size: (u32, u32),
    pub audio_channels: u16,
    pub audio_frame_rate: u32,
    pub three_d: bool,
    pub encrypted: bool,
    pub key: Option<Key>,
    pub subtitle_language: Option<String>,

    #[serde(default)]
    pub markers: BTreeMap<Marker, DcpTime>,

    /// Describes the video content, see [`Film::content_summary`]
    pub video_summary: String,
}

impl FilmSettings {
    pub fn new<P: Into<PathBuf>>(name: &str, directory: P) -> Self {
        FilmSettings {
            name: name.to_string(),
            directory: directory.into(),
            dcp_name: format!("{}_TST_F_XX-XX_51_2K_20261018_SMPTE_OV", name),
            video_frame_rate: 24,
            frame_size: (1998, 1080),
            audio_channels: 6,
            audio_frame_rate: 48000,
            three_d: false,
            encrypted: false,
            key: None,
            subtitle_language: None,
            markers: BTreeMap::new(),
            video_summary: String::new(),
        }
    }
}

impl Film for FilmSettings {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn video_frame_rate(&self) -> u32 {
        self.video_frame_rate
    }

    fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    fn audio_channels(&self) -> u16 {
        self.audio_channels
    }

    fn audio_frame_rate(&self) -> u32 {
        self.audio_frame_rate
    }

    fn three_d(&self) -> bool {
        self.three_d
    }

    fn encrypted(&self) -> bool {
        self.encrypted
    }

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn subtitle_language(&self) -> Option<String> {
        self.subtitle_language.clone()
    }

    fn markers(&self) -> BTreeMap<Marker, DcpTime> {
        self.markers.clone()
    }

    fn directory(&self) -> PathBuf {
        self.directory.clone()
    }

    fn dcp_name(&self) -> String {
        self.dcp_name.clone()
    }

    fn content_summary(&self, period: TimePeriod) -> String {
        format!(
            "{}_{}x{}_{}_{}_{}",
            self.video_summary,
            self.frame_size.0,
            self.frame_size.1,
            self.video_frame_rate,
            if self.three_d { "3D" } else { "2D" },
            period,
        )
    }
}
