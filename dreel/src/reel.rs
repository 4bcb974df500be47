//! Composition of assets into reels.
//!
//! Every kind of asset goes through [`ReelAssembler::add_or_reference`]: an
//! asset written by this run wins, then an asset from another package that
//! covers exactly the same period, then (for text tracks only) an empty
//! placeholder when the caller asks for one.
use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::Deserialize;
use serde::Serialize;

use dcore::time::{DcpTime, TimePeriod};

use crate::asset::{AssetKind, ReelAsset, TrackId};
use crate::error::ReelError;
use crate::film::Marker;

/// An asset made elsewhere that a reel may cite instead of writing its own.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReferencedAsset {
    pub asset: ReelAsset,
    pub period: TimePeriod,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Reel {
    pub period: TimePeriod,
    pub edit_rate: u32,
    pub picture: Option<ReelAsset>,
    pub sound: Option<ReelAsset>,
    pub subtitle: Option<ReelAsset>,
    pub closed_captions: BTreeMap<TrackId, ReelAsset>,
    pub atmos: Option<ReelAsset>,
    pub markers: Option<ReelAsset>,
}

impl Reel {
    pub fn new(period: TimePeriod, edit_rate: u32) -> Self {
        Reel {
            period,
            edit_rate,
            picture: None,
            sound: None,
            subtitle: None,
            closed_captions: BTreeMap::new(),
            atmos: None,
            markers: None,
        }
    }

    /// Length of the reel in frames.
    pub fn duration(&self) -> i64 {
        self.period.duration().frames_round(self.edit_rate)
    }

    /// Attach `asset`, which has to last exactly as long as the reel.
    pub fn add(&mut self, asset: ReelAsset) -> Result<(), ReelError> {
        let reel = self.duration();
        if asset.actual_duration() != reel {
            return Err(ReelError::DurationMismatch {
                kind: asset.kind.to_string(),
                asset: asset.actual_duration(),
                reel,
            });
        }

        self.attach(asset);
        Ok(())
    }

    fn attach(&mut self, asset: ReelAsset) {
        debug!("Reel {} gets {} asset {}", self.period, asset.kind, asset.id);

        match asset.kind.clone() {
            AssetKind::Picture { .. } => self.picture = Some(asset),
            AssetKind::Sound => self.sound = Some(asset),
            AssetKind::Subtitle => self.subtitle = Some(asset),
            AssetKind::ClosedCaption(track) => {
                self.closed_captions.insert(track, asset);
            }
            AssetKind::Atmos => self.atmos = Some(asset),
            AssetKind::Markers => self.markers = Some(asset),
        }
    }

    /// Every asset of the reel.
    pub fn assets(&self) -> Vec<&ReelAsset> {
        let mut assets: Vec<&ReelAsset> = Vec::new();
        assets.extend(self.picture.iter());
        assets.extend(self.sound.iter());
        assets.extend(self.subtitle.iter());
        assets.extend(self.closed_captions.values());
        assets.extend(self.atmos.iter());
        assets.extend(self.markers.iter());
        assets
    }
}

pub struct ReelAssembler<'a> {
    reel: Reel,
    refs: &'a [ReferencedAsset],
    text_only: bool,
}

impl<'a> ReelAssembler<'a> {
    /// In `text_only` mode the durations of referenced assets are not checked.
    pub fn new(period: TimePeriod, edit_rate: u32, refs: &'a [ReferencedAsset], text_only: bool) -> Self {
        ReelAssembler {
            reel: Reel::new(period, edit_rate),
            refs,
            text_only,
        }
    }

    pub fn text_only(&self) -> bool {
        self.text_only
    }

    pub fn reel(&self) -> &Reel {
        &self.reel
    }

    /// Referenced asset for `kind` covering exactly this reel.
    pub fn find_reference(&self, kind: &AssetKind) -> Option<&'a ReferencedAsset> {
        let period = self.reel.period;
        self.refs
            .iter()
            .find(|r| r.period == period && r.asset.kind.same_slot(kind))
    }

    /// Attach `own`, else a reference, else whatever `placeholder` makes.
    ///
    /// Returns whether anything was attached.
    pub fn add_or_reference<F>(&mut self, kind: &AssetKind, own: Option<ReelAsset>, placeholder: F) -> Result<bool, ReelError>
    where
        F: FnOnce(i64) -> Result<Option<ReelAsset>, ReelError>,
    {
        if let Some(asset) = own {
            self.reel.add(asset)?;
            return Ok(true);
        }

        if let Some(reference) = self.find_reference(kind) {
            debug!("Reel {} references {} asset {}", self.reel.period, kind, reference.asset.id);
            if self.text_only {
                self.reel.attach(reference.asset.clone());
            } else {
                self.reel.add(reference.asset.clone())?;
            }
            return Ok(true);
        }

        match placeholder(self.reel.duration())? {
            Some(asset) => {
                debug!("Reel {} gets an empty {} asset", self.reel.period, kind);
                self.reel.add(asset)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Caption tracks this reel should carry: own, ensured and referenced.
    pub fn caption_tracks<'b, I>(&self, own: I, ensure: &BTreeSet<TrackId>) -> BTreeSet<TrackId>
    where
        I: IntoIterator<Item = &'b TrackId>,
    {
        let period = self.reel.period;
        let referenced = self.refs.iter().filter(|r| r.period == period).filter_map(|r| match &r.asset.kind {
            AssetKind::ClosedCaption(track) => Some(track.clone()),
            _ => None,
        });

        own.into_iter().cloned().chain(ensure.iter().cloned()).chain(referenced).collect()
    }

    pub fn finish(self) -> Reel {
        self.reel
    }
}

/// Markers of the package that fall inside `period`, relative to its start.
pub fn reel_markers(markers: &BTreeMap<Marker, DcpTime>, period: TimePeriod) -> BTreeMap<Marker, DcpTime> {
    markers
        .iter()
        .filter(|(_, t)| period.contains(**t))
        .map(|(m, t)| (*m, *t - period.from))
        .collect()
}
