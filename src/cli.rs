use std::fs;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use thiserror::Error;

use clap::{Parser, Subcommand};

use dreel::{ReelWriterOptions, VerifyMode};

#[derive(Parser)]
#[command(name = "reelforge")]
#[command(about = "Maintenance tool for resumable DCP reel output")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Checks a picture asset against its frame index
    Verify {
        /// The picture asset in the working directory
        #[arg(short, long)]
        asset: PathBuf,

        /// The frame index of the asset
        #[arg(short, long)]
        index: PathBuf,

        /// The asset holds left and right eye frames
        #[arg(long)]
        stereo: bool,

        /// full or tail, the config file decides otherwise
        #[arg(short, long)]
        mode: Option<VerifyMode>,
    },

    /// Prints the digest of files
    Digest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Lists the reels of a reel manifest
    Inspect {
        manifest: PathBuf,
    },
}

pub const DEFAULT_CONFIG: &str = r#"
    [log]
    level = "info"

    [resume]
    verify = "Full"

    [promote]
    copy_buffer = 1048576
"#;

#[derive(Deserialize, Debug)]
pub struct Config {
    pub log: LogConfig,
    pub resume: ResumeConfig,
    pub promote: PromoteConfig,
}

#[derive(Deserialize, Debug)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Deserialize, Debug)]
pub struct ResumeConfig {
    pub verify: VerifyMode,
}

#[derive(Deserialize, Debug)]
pub struct PromoteConfig {
    pub copy_buffer: usize,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load the config at `path`, the built in defaults without one.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        None => toml::from_str(DEFAULT_CONFIG).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<default>"),
            source,
        }),
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

impl Config {
    pub fn writer_options(&self) -> ReelWriterOptions {
        ReelWriterOptions {
            text_only: false,
            verify: self.resume.verify,
            copy_buffer: self.promote.copy_buffer,
        }
    }
}

#[cfg(test)]
mod test_config {
    use super::*;

    #[test]
    fn default_config() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();

        assert_eq!(config.log.level, "info");
        assert_eq!(config.writer_options(), ReelWriterOptions::default());
    }

    #[test]
    fn tail_mode() {
        let config: Config = toml::from_str(
            r#"
            [log]
            level = "debug"

            [resume]
            verify = "Tail"

            [promote]
            copy_buffer = 4096
        "#,
        )
        .unwrap();

        let options = config.writer_options();
        assert_eq!(options.verify, VerifyMode::Tail);
        assert_eq!(options.copy_buffer, 4096);
    }

    #[test]
    fn missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelforge.toml");

        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn malformed_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelforge.toml");
        std::fs::write(&path, "[log]\nlevel = 3\n").unwrap();

        match load_config(Some(&path)) {
            Err(e @ ConfigError::Parse { .. }) => {
                assert!(e.to_string().contains("reelforge.toml"));
                assert!(std::error::Error::source(&e).is_some());
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelforge.toml");
        std::fs::write(&path, DEFAULT_CONFIG.replace("Full", "Tail")).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap().resume.verify, VerifyMode::Tail);
        assert_eq!(load_config(None).unwrap().resume.verify, VerifyMode::Full);
    }

    #[test]
    fn verify_command() {
        let cli = Cli::parse_from([
            "reelforge", "verify", "--asset", "a.mxf", "--index", "a.info", "--stereo", "--mode", "tail",
        ]);

        match cli.command {
            Some(Commands::Verify { stereo, mode, .. }) => {
                assert!(stereo);
                assert_eq!(mode, Some(VerifyMode::Tail));
            }
            _ => panic!("expected verify"),
        }
    }
}
