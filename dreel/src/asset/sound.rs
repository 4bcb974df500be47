use std::path::Path;

use crate::asset::{AssetFile, Location};
use crate::error::ReelError;

const BYTES_PER_SAMPLE: usize = 3;
const MAX_SAMPLE: f32 = 8_388_607.0;

/// Block of audio, one sample vector per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffers {
    data: Vec<Vec<f32>>,
}

impl AudioBuffers {
    /// Silence of `frames` samples on every channel.
    pub fn new(channels: usize, frames: usize) -> Self {
        AudioBuffers {
            data: vec![vec![0.0; frames]; channels],
        }
    }

    pub fn from_channels(data: Vec<Vec<f32>>) -> Self {
        if let Some(first) = data.first() {
            assert!(
                data.iter().all(|c| c.len() == first.len()),
                "audio channels must all hold the same number of samples"
            );
        }
        AudioBuffers { data }
    }

    pub fn channels(&self) -> usize {
        self.data.len()
    }

    pub fn frames(&self) -> usize {
        self.data.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn data(&self, channel: usize) -> &[f32] {
        &self.data[channel]
    }
}

/// Writes interleaved 24 bit little endian PCM.
pub struct SoundAssetWriter {
    file: AssetFile,
    channels: usize,
    sample_rate: u32,
    video_frame_rate: u32,
    samples: u64,
}

impl SoundAssetWriter {
    pub fn create(path: &Path, channels: u16, sample_rate: u32, video_frame_rate: u32) -> Result<Self, ReelError> {
        Ok(SoundAssetWriter {
            file: AssetFile::create(path)?,
            channels: channels as usize,
            sample_rate,
            video_frame_rate,
            samples: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Channels missing from `audio` are written as silence, extra ones are
    /// dropped.
    pub fn write(&mut self, audio: &AudioBuffers) -> Result<Location, ReelError> {
        let frames = audio.frames();
        let mut buf = Vec::with_capacity(frames * self.channels * BYTES_PER_SAMPLE);

        for i in 0..frames {
            for c in 0..self.channels {
                let sample = if c < audio.channels() { audio.data(c)[i] } else { 0.0 };
                buf.extend_from_slice(&encode_sample(sample));
            }
        }

        let location = self.file.append(&buf)?;
        self.samples += frames as u64;
        Ok(location)
    }

    /// Length of what was written in picture frames.
    pub fn duration(&self) -> i64 {
        let rate = self.sample_rate as u64;
        ((self.samples * self.video_frame_rate as u64 + rate / 2) / rate) as i64
    }

    pub fn finalize(&mut self) -> Result<bool, ReelError> {
        self.file.finalize()
    }
}

fn encode_sample(sample: f32) -> [u8; BYTES_PER_SAMPLE] {
    let value = (sample.clamp(-1.0, 1.0) * MAX_SAMPLE).round() as i32;
    let bytes = value.to_le_bytes();
    [bytes[0], bytes[1], bytes[2]]
}

#[cfg(test)]
mod test_sound_writer {
    use super::*;
    use std::fs;

    #[test]
    fn samples() {
        assert_eq!(encode_sample(0.0), [0, 0, 0]);
        assert_eq!(encode_sample(1.0), [0xff, 0xff, 0x7f]);
        assert_eq!(encode_sample(-1.0), [0x01, 0x00, 0x80]);
        assert_eq!(encode_sample(4.0), encode_sample(1.0));
        assert_eq!(encode_sample(-4.0), encode_sample(-1.0));
    }

    #[test]
    fn interleaves_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcm.mxf");
        let mut writer = SoundAssetWriter::create(&path, 2, 48000, 24).unwrap();

        let audio = AudioBuffers::from_channels(vec![vec![1.0, 0.0], vec![0.0, -1.0]]);
        assert_eq!(writer.write(&audio).unwrap(), Location { offset: 0, size: 12 });
        assert!(writer.finalize().unwrap());

        assert_eq!(
            fs::read(&path).unwrap(),
            vec![0xff, 0xff, 0x7f, 0, 0, 0, 0, 0, 0, 0x01, 0x00, 0x80]
        );
    }

    #[test]
    fn pads_missing_channels() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SoundAssetWriter::create(&dir.path().join("pcm.mxf"), 6, 48000, 24).unwrap();

        let location = writer.write(&AudioBuffers::new(2, 10)).unwrap();
        assert_eq!(location.size, 10 * 6 * 3);
    }

    #[test]
    fn duration_in_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SoundAssetWriter::create(&dir.path().join("pcm.mxf"), 1, 48000, 24).unwrap();

        // One picture frame at 24fps is 2000 samples
        for _ in 0..10 {
            writer.write(&AudioBuffers::new(1, 2000)).unwrap();
        }
        assert_eq!(writer.duration(), 10);

        writer.write(&AudioBuffers::new(1, 1200)).unwrap();
        assert_eq!(writer.duration(), 11);
    }

    #[test]
    #[should_panic]
    fn uneven_channels() {
        AudioBuffers::from_channels(vec![vec![0.0; 2], vec![0.0; 3]]);
    }

    #[test]
    fn nothing_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SoundAssetWriter::create(&dir.path().join("pcm.mxf"), 6, 48000, 24).unwrap();

        assert!(!writer.finalize().unwrap());
        assert!(!writer.finalize().unwrap());
    }
}
