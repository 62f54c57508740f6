// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! Video format descriptors and audio cadence derivation.
//!
//! A [`VideoFormatDesc`] pins down everything the pipeline needs to run one
//! channel: pixel geometry, field mode, an exact rational frame rate, the
//! audio sample rate and the per-frame audio cadence. The cadence is the
//! fixed-period vector of per-tick sample counts; its average is exactly
//! `sample_rate / fps`, which keeps long-run audio bit-exact even for
//! fractional rates like 30000/1001.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};

/// Interlacing mode of a video format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldMode {
    Progressive,
    Upper,
    Lower,
}

impl fmt::Display for FieldMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldMode::Progressive => write!(f, "p"),
            FieldMode::Upper | FieldMode::Lower => write!(f, "i"),
        }
    }
}

/// Exact rational frame rate (frames per second as `num / den`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub den: u32,
}

impl Framerate {
    /// # Panics
    ///
    /// Panics if `den` is zero.
    pub const fn new(num: u32, den: u32) -> Self {
        assert!(den != 0, "framerate denominator must not be zero");
        Self { num, den }
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Frame rate rounded to the nearest integer, as used by SMPTE timecode.
    pub fn rounded(self) -> u8 {
        self.as_f64().round() as u8
    }

    /// Duration of one frame in nanoseconds, rounded down.
    pub fn frame_duration_ns(self) -> i64 {
        i64::from(self.den) * 1_000_000_000 / i64::from(self.num)
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Named broadcast format presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoFormat {
    Pal,
    Ntsc,
    Hd720p50,
    Hd720p5994,
    Hd1080i50,
    Hd1080p25,
    Hd1080p50,
    Hd1080p5994,
    Uhd2160p50,
}

impl VideoFormat {
    pub fn name(self) -> &'static str {
        match self {
            VideoFormat::Pal => "PAL",
            VideoFormat::Ntsc => "NTSC",
            VideoFormat::Hd720p50 => "720p50",
            VideoFormat::Hd720p5994 => "720p5994",
            VideoFormat::Hd1080i50 => "1080i50",
            VideoFormat::Hd1080p25 => "1080p25",
            VideoFormat::Hd1080p50 => "1080p50",
            VideoFormat::Hd1080p5994 => "1080p5994",
            VideoFormat::Uhd2160p50 => "2160p50",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PAL" => Ok(VideoFormat::Pal),
            "NTSC" => Ok(VideoFormat::Ntsc),
            "720P50" => Ok(VideoFormat::Hd720p50),
            "720P5994" => Ok(VideoFormat::Hd720p5994),
            "1080I50" => Ok(VideoFormat::Hd1080i50),
            "1080P25" => Ok(VideoFormat::Hd1080p25),
            "1080P50" => Ok(VideoFormat::Hd1080p50),
            "1080P5994" => Ok(VideoFormat::Hd1080p5994),
            "2160P50" => Ok(VideoFormat::Uhd2160p50),
            other => Err(PipelineError::Format(format!("unknown format: {other}"))),
        }
    }
}

/// Immutable description of one video mode.
///
/// Invariant: `sum(audio_cadence) * framerate.num ==
/// audio_sample_rate * audio_cadence.len() * framerate.den`, bit-exact.
/// Constructors uphold it; a descriptor is never mutated after creation,
/// only replaced wholesale on a channel format change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFormatDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub field_mode: FieldMode,
    pub framerate: Framerate,
    pub audio_sample_rate: u32,
    pub audio_channels: usize,
    pub audio_cadence: Vec<usize>,
}

impl VideoFormatDesc {
    /// Build a descriptor, deriving the audio cadence from the sample rate
    /// and frame rate.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        field_mode: FieldMode,
        framerate: Framerate,
        audio_sample_rate: u32,
        audio_channels: usize,
    ) -> Self {
        let audio_cadence = derive_cadence(audio_sample_rate, framerate);
        Self {
            name: name.into(),
            width,
            height,
            field_mode,
            framerate,
            audio_sample_rate,
            audio_channels,
            audio_cadence,
        }
    }

    /// Build a descriptor with an explicit cadence, validating the cadence
    /// invariant.
    pub fn with_cadence(
        name: impl Into<String>,
        width: u32,
        height: u32,
        field_mode: FieldMode,
        framerate: Framerate,
        audio_sample_rate: u32,
        audio_channels: usize,
        audio_cadence: Vec<usize>,
    ) -> Result<Self> {
        let sum: u64 = audio_cadence.iter().map(|&n| n as u64).sum();
        let lhs = sum * u64::from(framerate.num);
        let rhs =
            u64::from(audio_sample_rate) * audio_cadence.len() as u64 * u64::from(framerate.den);
        if audio_cadence.is_empty() || lhs != rhs {
            return Err(PipelineError::Format(format!(
                "audio cadence {audio_cadence:?} does not integrate to {audio_sample_rate} Hz at {framerate} fps"
            )));
        }
        Ok(Self {
            name: name.into(),
            width,
            height,
            field_mode,
            framerate,
            audio_sample_rate,
            audio_channels,
            audio_cadence,
        })
    }

    pub fn preset(format: VideoFormat) -> Self {
        let (width, height, field_mode, framerate) = match format {
            VideoFormat::Pal => (720, 576, FieldMode::Upper, Framerate::new(25, 1)),
            VideoFormat::Ntsc => (720, 486, FieldMode::Upper, Framerate::new(30000, 1001)),
            VideoFormat::Hd720p50 => (1280, 720, FieldMode::Progressive, Framerate::new(50, 1)),
            VideoFormat::Hd720p5994 => {
                (1280, 720, FieldMode::Progressive, Framerate::new(60000, 1001))
            }
            VideoFormat::Hd1080i50 => (1920, 1080, FieldMode::Upper, Framerate::new(25, 1)),
            VideoFormat::Hd1080p25 => (1920, 1080, FieldMode::Progressive, Framerate::new(25, 1)),
            VideoFormat::Hd1080p50 => (1920, 1080, FieldMode::Progressive, Framerate::new(50, 1)),
            VideoFormat::Hd1080p5994 => {
                (1920, 1080, FieldMode::Progressive, Framerate::new(60000, 1001))
            }
            VideoFormat::Uhd2160p50 => {
                (3840, 2160, FieldMode::Progressive, Framerate::new(50, 1))
            }
        };
        Self::new(format.name(), width, height, field_mode, framerate, 48_000, 2)
    }

    pub fn fps(&self) -> f64 {
        self.framerate.as_f64()
    }

    /// Total image bytes for one BGRA frame.
    pub fn image_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl Default for VideoFormatDesc {
    fn default() -> Self {
        Self::preset(VideoFormat::Pal)
    }
}

impl fmt::Display for VideoFormatDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Derive the shortest cadence whose sum integrates exactly to
/// `sample_rate / fps`.
///
/// The cadence length is the smallest `L` for which
/// `sample_rate * den * L` is divisible by `num`; entries are distributed by
/// nearest-rounding so consecutive counts differ by at most one sample.
fn derive_cadence(sample_rate: u32, framerate: Framerate) -> Vec<usize> {
    let num = u64::from(framerate.num);
    let per_period = u64::from(sample_rate) * u64::from(framerate.den);

    let len = (num / gcd(num, per_period)) as usize;
    let total = per_period * len as u64 / num;

    let mut cadence = Vec::with_capacity(len);
    let mut last = 0u64;
    for i in 1..=len as u64 {
        // round(i * total / len)
        let boundary = (i * total + len as u64 / 2) / len as u64;
        cadence.push((boundary - last) as usize);
        last = boundary;
    }
    cadence
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
