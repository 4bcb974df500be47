//! Writes one reel of a package.
//!
//! Construction works out how much of a previous run's picture can be kept
//! and opens the writers. Frames and audio are then fed in order, `finish`
//! seals the assets and moves them into the package, and `create_reel`
//! composes them with any referenced assets.
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use dcore::hash;
use dcore::time::TimePeriod;

use crate::asset::{
    new_asset_id, AssetKind, AtmosMetadata, AudioBuffers, FontRef, ImmersiveAssetWriter, PictureAssetWriter,
    ReelAsset, SoundAssetWriter, TextAsset, TextEntry, TrackId,
};
use crate::error::ReelError;
use crate::film::Film;
use crate::frame_index::{Eyes, FrameIndex, FrameInfo};
use crate::job::{self, Progress};
use crate::promote::{self, DEFAULT_COPY_BUFFER};
use crate::reel::{reel_markers, Reel, ReelAssembler, ReferencedAsset};
use crate::resume::{self, VerifyMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReelWriterOptions {
    /// Only the text assets matter, picture frames are fake written to a
    /// separate probe file and the frame index is left alone.
    pub text_only: bool,
    pub verify: VerifyMode,
    pub copy_buffer: usize,
}

impl Default for ReelWriterOptions {
    fn default() -> Self {
        ReelWriterOptions {
            text_only: false,
            verify: VerifyMode::Full,
            copy_buffer: DEFAULT_COPY_BUFFER,
        }
    }
}

pub struct ReelWriter {
    film: Arc<dyn Film + Send + Sync>,
    period: TimePeriod,
    options: ReelWriterOptions,
    first_missing: u64,

    picture_id: String,
    picture: PictureAssetWriter,
    index: Option<FrameIndex<File>>,
    last_written: BTreeMap<Eyes, Vec<u8>>,

    sound: Option<(String, SoundAssetWriter)>,
    atmos: Option<(String, ImmersiveAssetWriter)>,
    subtitle: Option<TextAsset>,
    captions: BTreeMap<TrackId, TextAsset>,

    // Set by finish
    finished: bool,
    picture_asset: Option<ReelAsset>,
    sound_asset: Option<ReelAsset>,
    atmos_asset: Option<ReelAsset>,
}

impl ReelWriter {
    pub fn new(
        film: Arc<dyn Film + Send + Sync>,
        period: TimePeriod,
        progress: Option<&dyn Progress>,
        options: ReelWriterOptions,
    ) -> Result<Self, ReelError> {
        let stereo = film.three_d();
        let asset_path = film
            .internal_video_asset_dir()
            .join(film.internal_video_asset_filename(period));
        let info_path = film.info_file(period);

        let (picture, first_missing) = if options.text_only {
            let probe = asset_path.with_extension("probe");
            (PictureAssetWriter::create(&probe, stereo)?, 0)
        } else {
            // A previous package may still be linked to this file
            promote::break_hard_link(&asset_path)?;

            let first_missing =
                resume::check_existing_picture(&asset_path, &info_path, stereo, options.verify, progress);
            let offset = match first_missing {
                0 => None,
                n => FrameIndex::open_for_read(&info_path, stereo)
                    .and_then(|mut index| resume::resume_offset(&mut index, n).ok()),
            };

            match offset {
                Some(at) => {
                    info!("Resuming {} from frame {} at byte {}", asset_path.display(), first_missing, at);
                    (PictureAssetWriter::resume(&asset_path, stereo, at, first_missing)?, first_missing)
                }
                None => (PictureAssetWriter::create(&asset_path, stereo)?, 0),
            }
        };

        let sound = match film.audio_channels() {
            0 => None,
            channels => {
                let id = new_asset_id();
                let path = film.directory().join(promote::sound_filename(&id));
                let writer =
                    SoundAssetWriter::create(&path, channels, film.audio_frame_rate(), film.video_frame_rate())?;
                Some((id, writer))
            }
        };

        Ok(ReelWriter {
            picture_id: film.video_identifier(period),
            film,
            period,
            options,
            first_missing,
            picture,
            index: None,
            last_written: BTreeMap::new(),
            sound,
            atmos: None,
            subtitle: None,
            captions: BTreeMap::new(),
            finished: false,
            picture_asset: None,
            sound_asset: None,
            atmos_asset: None,
        })
    }

    pub fn period(&self) -> TimePeriod {
        self.period
    }

    /// First frame, counted from the reel start, that still has to be written.
    pub fn first_missing_frame(&self) -> u64 {
        self.first_missing
    }

    /// First frame of the reel counted from the start of the film.
    pub fn start(&self) -> i64 {
        self.period.from.frames_floor(self.film.video_frame_rate())
    }

    fn check_frame(&self, frame: u64) -> Result<(), ReelError> {
        if frame < self.first_missing {
            return Err(ReelError::AlreadyWritten {
                frame,
                first_missing: self.first_missing,
            });
        }
        Ok(())
    }

    fn record(&mut self, frame: u64, eyes: Eyes, info: &FrameInfo) -> Result<(), ReelError> {
        if self.options.text_only {
            return Ok(());
        }

        let index = match self.index.take() {
            Some(index) => index,
            None => FrameIndex::open_for_write(&self.film.info_file(self.period), self.film.three_d())?,
        };
        self.index.insert(index).write(frame, eyes, info)
    }

    /// Write one compressed frame, `frame` counted from the reel start.
    pub fn write(&mut self, data: &[u8], frame: u64, eyes: Eyes) -> Result<(), ReelError> {
        self.check_frame(frame)?;

        let info = self.picture.write(data)?;
        self.record(frame, eyes, &info)?;
        self.last_written.insert(eyes, data.to_vec());
        Ok(())
    }

    /// Account for a frame of `size` bytes without writing it.
    pub fn fake_write(&mut self, frame: u64, eyes: Eyes, size: u64) -> Result<(), ReelError> {
        self.check_frame(frame)?;
        self.picture.fake_write(size)?;
        Ok(())
    }

    /// Write the last frame written for `eyes` again as `frame`.
    pub fn repeat_write(&mut self, frame: u64, eyes: Eyes) -> Result<(), ReelError> {
        self.check_frame(frame)?;

        let info = match self.last_written.get(&eyes) {
            Some(previous) => self.picture.repeat_write(previous)?,
            None => return Err(ReelError::NothingToRepeat { frame }),
        };
        self.record(frame, eyes, &info)
    }

    /// Audio is dropped when the film has no audio channels.
    pub fn write_audio(&mut self, audio: &AudioBuffers) -> Result<(), ReelError> {
        if let Some((_, writer)) = self.sound.as_mut() {
            writer.write(audio)?;
        }
        Ok(())
    }

    pub fn write_atmos(&mut self, block: &[u8], metadata: AtmosMetadata) -> Result<(), ReelError> {
        if self.atmos.is_none() {
            let id = new_asset_id();
            let path = self.film.directory().join(promote::atmos_filename(&id));
            self.atmos = Some((id, ImmersiveAssetWriter::create(&path, metadata)?));
        }

        if let Some((_, writer)) = self.atmos.as_mut() {
            writer.write(block)?;
        }
        Ok(())
    }

    fn new_text_asset(&self, track: Option<TrackId>) -> TextAsset {
        let language = match &track {
            Some(track) => track.language.clone(),
            None => self.film.subtitle_language().unwrap_or_else(|| "Unknown".to_string()),
        };
        TextAsset::new(new_asset_id(), track, &self.film.name(), &language, self.film.video_frame_rate())
    }

    pub fn write_subtitle(&mut self, entry: TextEntry) {
        if self.subtitle.is_none() {
            self.subtitle = Some(self.new_text_asset(None));
        }
        if let Some(subtitle) = self.subtitle.as_mut() {
            subtitle.add(entry);
        }
    }

    pub fn write_caption(&mut self, track: TrackId, entry: TextEntry) {
        if !self.captions.contains_key(&track) {
            let asset = self.new_text_asset(Some(track.clone()));
            self.captions.insert(track.clone(), asset);
        }
        if let Some(caption) = self.captions.get_mut(&track) {
            caption.add(entry);
        }
    }

    fn key_id(&self) -> Option<String> {
        if self.film.encrypted() {
            self.film.key().map(|k| k.id())
        } else {
            None
        }
    }

    /// Seal every asset and move the written ones into the package.
    ///
    /// Assets already promoted are skipped, so a failed `finish` can be
    /// called again once the cause is out of the way.
    pub fn finish(&mut self, progress: Option<&dyn Progress>) -> Result<(), ReelError> {
        if self.finished {
            return Ok(());
        }

        if let Some(index) = self.index.as_mut() {
            index.flush()?;
        }

        let fps = self.film.video_frame_rate();
        let package = self.film.package_dir();
        let key_id = self.key_id();

        if self.picture_asset.is_none() {
            if self.picture.finalize()? {
                let mut asset = ReelAsset::new(
                    self.picture_id.clone(),
                    AssetKind::Picture {
                        stereo: self.picture.stereo(),
                    },
                    fps,
                    self.picture.frames() as i64,
                );
                asset.key_id = key_id.clone();

                if self.options.text_only {
                    self.picture_asset = Some(asset.with_file(self.picture.path()));
                } else {
                    let to = package.join(promote::picture_filename(&self.picture_id));
                    promote::promote_picture(self.picture.path(), &to, self.options.copy_buffer, progress)?;
                    self.picture_asset = Some(asset.with_file(to));
                }
            } else {
                debug!("Nothing was written to the picture asset");
            }
        }

        let sound_done = self.sound_asset.is_some();
        if let (false, Some((id, writer))) = (sound_done, self.sound.as_mut()) {
            if writer.finalize()? {
                let mut asset = ReelAsset::new(id.clone(), AssetKind::Sound, fps, writer.duration());
                asset.key_id = key_id.clone();

                let to = package.join(promote::sound_filename(id));
                promote::promote_move(writer.path(), &to)?;
                self.sound_asset = Some(asset.with_file(to));
            } else {
                debug!("Nothing was written to the sound asset");
                remove_empty(writer.path())?;
            }
        }

        let atmos_done = self.atmos_asset.is_some();
        if let (false, Some((id, writer))) = (atmos_done, self.atmos.as_mut()) {
            if writer.finalize()? {
                let mut asset = ReelAsset::new(id.clone(), AssetKind::Atmos, fps, writer.duration());
                asset.key_id = key_id.clone();

                let to = package.join(promote::atmos_filename(id));
                promote::promote_move(writer.path(), &to)?;
                self.atmos_asset = Some(asset.with_file(to));
            } else {
                remove_empty(writer.path())?;
            }
        }

        self.finished = true;
        Ok(())
    }

    /// Digest the finished picture, sound and immersive audio assets.
    pub fn calculate_digests(&mut self, progress: Option<&dyn Progress>) -> Result<(), ReelError> {
        let stages = [
            ("Computing image digest", self.picture_asset.as_mut()),
            ("Computing audio digest", self.sound_asset.as_mut()),
            ("Computing atmos digest", self.atmos_asset.as_mut()),
        ];

        for (label, asset) in stages {
            let asset = match asset {
                Some(asset) => asset,
                None => continue,
            };
            let file = match asset.file.clone() {
                Some(file) => file,
                None => continue,
            };

            job::sub(progress, label);
            asset.hash = Some(hash::hash_file(&file, |f| job::set_progress(progress, f))?);
        }
        Ok(())
    }

    /// Write a text asset into the package and return its handle.
    fn write_text(&self, mut asset: TextAsset, fonts: &[FontRef], frames: i64) -> Result<ReelAsset, ReelError> {
        for font in fonts.iter() {
            asset.add_font(font)?;
        }
        asset.intrinsic_duration = frames;

        let path = self.film.package_dir().join(asset.filename());
        let digest = asset.write(&path)?;

        let kind = match asset.track.clone() {
            Some(track) => AssetKind::ClosedCaption(track),
            None => AssetKind::Subtitle,
        };
        let mut reel_asset = ReelAsset::new(asset.id.clone(), kind, asset.edit_rate, frames).with_file(path);
        reel_asset.hash = Some(digest);
        Ok(reel_asset)
    }

    /// Compose the reel from this writer's assets and `refs`.
    ///
    /// Empty subtitle and caption assets are made when `ensure_subtitles` or
    /// `ensure_closed_captions` ask for tracks that nothing else provides.
    pub fn create_reel(
        &self,
        refs: &[ReferencedAsset],
        fonts: &[FontRef],
        ensure_subtitles: bool,
        ensure_closed_captions: &BTreeSet<TrackId>,
    ) -> Result<Reel, ReelError> {
        let fps = self.film.video_frame_rate();
        let mut assembler = ReelAssembler::new(self.period, fps, refs, self.options.text_only);
        let text_only = assembler.text_only();

        let picture_kind = AssetKind::Picture {
            stereo: self.film.three_d(),
        };
        let picture = assembler.add_or_reference(&picture_kind, self.picture_asset.clone(), |_| Ok(None))?;
        if !picture && !text_only {
            return Err(ReelError::MissingAsset {
                kind: picture_kind.to_string(),
                period: self.period.to_string(),
            });
        }

        let sound = assembler.add_or_reference(&AssetKind::Sound, self.sound_asset.clone(), |_| Ok(None))?;
        if !sound && !text_only && self.film.audio_channels() > 0 {
            return Err(ReelError::MissingAsset {
                kind: AssetKind::Sound.to_string(),
                period: self.period.to_string(),
            });
        }

        let subtitle = match &self.subtitle {
            Some(subtitle) => Some(self.write_text(subtitle.clone(), fonts, assembler.reel().duration())?),
            None => None,
        };
        assembler.add_or_reference(&AssetKind::Subtitle, subtitle, |frames| {
            if ensure_subtitles {
                self.write_text(self.new_text_asset(None), fonts, frames).map(Some)
            } else {
                Ok(None)
            }
        })?;

        for track in assembler.caption_tracks(self.captions.keys(), ensure_closed_captions) {
            let kind = AssetKind::ClosedCaption(track.clone());
            let own = match self.captions.get(&track) {
                Some(caption) => Some(self.write_text(caption.clone(), fonts, assembler.reel().duration())?),
                None => None,
            };
            let wanted = ensure_closed_captions.contains(&track);
            assembler.add_or_reference(&kind, own, |frames| {
                if wanted {
                    self.write_text(self.new_text_asset(Some(track.clone())), fonts, frames).map(Some)
                } else {
                    Ok(None)
                }
            })?;
        }

        assembler.add_or_reference(&AssetKind::Atmos, self.atmos_asset.clone(), |_| Ok(None))?;

        let markers = reel_markers(&self.film.markers(), self.period);
        let own_markers = if markers.is_empty() {
            None
        } else {
            let mut asset = ReelAsset::new(new_asset_id(), AssetKind::Markers, fps, assembler.reel().duration());
            asset.markers = markers;
            Some(asset)
        };
        assembler.add_or_reference(&AssetKind::Markers, own_markers, |_| Ok(None))?;

        Ok(assembler.finish())
    }

    pub fn picture_asset(&self) -> Option<&ReelAsset> {
        self.picture_asset.as_ref()
    }

    pub fn sound_asset(&self) -> Option<&ReelAsset> {
        self.sound_asset.as_ref()
    }

    pub fn atmos_asset(&self) -> Option<&ReelAsset> {
        self.atmos_asset.as_ref()
    }
}

fn remove_empty(path: &Path) -> Result<(), ReelError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
