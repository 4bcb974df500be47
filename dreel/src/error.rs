use std::path::PathBuf;

use thiserror::Error;

use crate::ltvc::LtvcError;

#[derive(Error, Debug)]
pub enum ReelError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Ltvc(#[from] LtvcError),
    #[error("could not format the manifest issue date: {0}")]
    IssueDate(#[from] time::error::Format),

    // Consistency errors, these point at a bug in the calling pipeline
    #[error("{kind} asset has a duration of {asset} frames but the reel is {reel} frames long")]
    DurationMismatch { kind: String, asset: i64, reel: i64 },
    #[error("reel {period} has no {kind} asset")]
    MissingAsset { kind: String, period: String },
    #[error("frame {frame} is already on disk (first missing frame is {first_missing})")]
    AlreadyWritten { frame: u64, first_missing: u64 },
    #[error("frame {frame} has nothing to repeat")]
    NothingToRepeat { frame: u64 },
    #[error("frame of {0} bytes does not fit an index record")]
    FrameTooLarge(u64),
    #[error("fake writes cannot be mixed with real writes")]
    MixedWrites,
    #[error("asset writer for {0} is already finalized")]
    Sealed(PathBuf),
    #[error("{path} is not a valid {what}: {reason}")]
    Decode {
        path: PathBuf,
        what: &'static str,
        reason: String,
    },

    // Promotion errors
    #[error("could not copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[error("could not move {from} into the package at {to} (os error {code:?}): {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        code: Option<i32>,
        source: std::io::Error,
    },
}
