use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error, info};

use dcore::hash;
use dreel::job::{LogProgress, Progress};
use dreel::manifest;
use dreel::{check_existing_picture, ReelError, VerifyMode};

mod cli;
use crate::cli::Cli;
use crate::cli::Commands;

fn main() -> ExitCode {
    // Parse the cli
    let cli = Cli::parse();

    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report(&e),
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log.level)).init();
    debug!("Config: {:?}", config);
    debug!("Reel writer options: {:?}", config.writer_options());

    let result = match &cli.command {
        Some(Commands::Verify {
            asset,
            index,
            stereo,
            mode,
        }) => {
            verify(asset, index, *stereo, mode.unwrap_or(config.writer_options().verify));
            Ok(())
        }
        Some(Commands::Digest { files }) => digest(files),
        Some(Commands::Inspect { manifest }) => inspect(manifest),
        None => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn report(e: &dyn Error) -> ExitCode {
    error!("{}", e);
    eprintln!("Error: {}", e);

    let mut source = e.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
    ExitCode::FAILURE
}

fn verify(asset: &Path, index: &Path, stereo: bool, mode: VerifyMode) {
    let progress = LogProgress;
    let first_missing = check_existing_picture(asset, index, stereo, mode, Some(&progress));

    println!("{}", first_missing);
}

fn digest(files: &[PathBuf]) -> Result<(), ReelError> {
    let progress = LogProgress;

    for file in files.iter() {
        progress.sub(&format!("Digesting {}", file.display()));

        let mut last = 0;
        let digest = hash::hash_file(file, |f| {
            // Log every 10%
            let step = (f * 10.0) as u32;
            if step > last {
                last = step;
                debug!("{}: {}%", file.display(), step * 10);
            }
        })?;

        println!("{}  {}", digest, file.display());
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<(), ReelError> {
    let manifest = manifest::read_manifest(path)?;
    info!("Manifest issued {}", manifest.header.issued);

    for (i, reel) in manifest.reels.iter().enumerate() {
        println!("Reel {}: {} ({} frames at {} fps)", i + 1, reel.period, reel.duration(), reel.edit_rate);

        for asset in reel.assets() {
            let file = asset
                .file
                .as_ref()
                .map(|f| f.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            let hash = asset.hash.map(|h| h.to_hex()).unwrap_or_else(|| "-".to_string());

            println!("\t{}\t{}\t{} frames\t{}\t{}", asset.kind, asset.id, asset.actual_duration(), hash, file);
            for (marker, time) in asset.markers.iter() {
                println!("\t\t{:?} at {}", marker, time.frames_round(reel.edit_rate));
            }
        }
    }
    Ok(())
}
