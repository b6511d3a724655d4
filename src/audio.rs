//! WAV input for the CLI
//!
//! Decodes a WAV file into mono f32 samples in [-1, 1]. Multi-channel audio is
//! averaged down to mono. There is no resampling: the file must already be
//! at the analysis rate.

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec};
use std::path::Path;
use tracing::debug;

/// Decoded mono audio
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: usize,
}

impl MonoAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

fn read_interleaved<R: std::io::Read>(reader: WavReader<R>, spec: WavSpec) -> Result<Vec<f32>> {
    match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to decode float samples"),
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to decode integer samples")
        }
    }
}

/// Load a WAV file as mono audio, requiring `expected_rate`
pub fn load_wav_mono(path: &Path, expected_rate: usize) -> Result<MonoAudio> {
    let reader = WavReader::open(path).with_context(|| format!("Failed to open WAV file {:?}", path))?;
    let spec = reader.spec();

    if spec.sample_rate as usize != expected_rate {
        bail!(
            "{:?} is sampled at {} Hz, expected {} Hz",
            path,
            spec.sample_rate,
            expected_rate
        );
    }
    if spec.channels == 0 {
        bail!("{:?} has no audio channels", path);
    }

    let interleaved = read_interleaved(reader, spec)?;
    let channels = spec.channels as usize;
    let samples: Vec<f32> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    debug!(
        channels,
        sample_rate = spec.sample_rate,
        samples = samples.len(),
        "Loaded WAV file"
    );

    Ok(MonoAudio {
        samples,
        sample_rate: spec.sample_rate as usize,
    })
}
