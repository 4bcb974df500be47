//! Package time base.
//!
//! Times are a signed count of ticks at [`HZ`] ticks per second. 96000 is
//! divisible by every picture rate a package uses (24, 25, 30, 48, 50, 60) and
//! by the common audio rates, so frame boundaries land on whole ticks.
use std::fmt;
use std::ops::{Add, Sub};

use serde::Deserialize;
use serde::Serialize;

pub const HZ: i64 = 96_000;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DcpTime(i64);

impl DcpTime {
    pub const fn new(ticks: i64) -> Self {
        DcpTime(ticks)
    }

    pub fn from_frames(frames: i64, fps: u32) -> Self {
        DcpTime(frames * HZ / fps as i64)
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    pub fn frames_floor(&self, fps: u32) -> i64 {
        (self.0 * fps as i64).div_euclid(HZ)
    }

    pub fn frames_round(&self, fps: u32) -> i64 {
        (2 * self.0 * fps as i64 + HZ).div_euclid(2 * HZ)
    }
}

impl Add for DcpTime {
    type Output = DcpTime;

    fn add(self, other: DcpTime) -> DcpTime {
        DcpTime(self.0 + other.0)
    }
}

impl Sub for DcpTime {
    type Output = DcpTime;

    fn sub(self, other: DcpTime) -> DcpTime {
        DcpTime(self.0 - other.0)
    }
}

impl fmt::Display for DcpTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half open period `[from, to)`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePeriod {
    pub from: DcpTime,
    pub to: DcpTime,
}

impl TimePeriod {
    pub fn new(from: DcpTime, to: DcpTime) -> Self {
        TimePeriod { from, to }
    }

    pub fn duration(&self) -> DcpTime {
        self.to - self.from
    }

    pub fn contains(&self, time: DcpTime) -> bool {
        self.from <= time && time < self.to
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}
