use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::error::StudyError;

fn spec(channels: u16, sample_rate: u32) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Fill a `.part` sibling and rename it over `path` once finalized. On any
/// error the partial file is removed and `path` is left untouched.
fn write_via_part<F>(path: &Path, spec: WavSpec, fill: F) -> Result<(), StudyError>
where
    F: FnOnce(&mut WavWriter<BufWriter<File>>) -> Result<(), StudyError>,
{
    let part = part_path(path);
    let result = WavWriter::create(&part, spec)
        .map_err(StudyError::from)
        .and_then(|mut writer| {
            fill(&mut writer)?;
            writer.finalize()?;
            Ok(())
        })
        .and_then(|()| fs::rename(&part, path).map_err(StudyError::from));
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

#[inline]
fn to_i16(s: f64) -> i16 {
    (s.clamp(-1.0, 1.0) * i16::MAX as f64) as i16
}

/// Write a mono 16-bit PCM file.
pub fn write_wav_mono(path: &Path, samples: &[f64], sample_rate: u32) -> Result<(), StudyError> {
    write_via_part(path, spec(1, sample_rate), |writer| {
        for &s in samples {
            writer.write_sample(to_i16(s))?;
        }
        Ok(())
    })?;
    info!(path = %path.display(), frames = samples.len(), "wrote mono wav");
    Ok(())
}

/// Write a stereo 16-bit PCM file, interleaved L R L R.
pub fn write_wav_stereo(
    path: &Path,
    left: &[f64],
    right: &[f64],
    sample_rate: u32,
) -> Result<(), StudyError> {
    if left.len() != right.len() {
        return Err(StudyError::invalid(
            "right",
            format!("channel lengths differ: left {} vs right {}", left.len(), right.len()),
        ));
    }
    write_via_part(path, spec(2, sample_rate), |writer| {
        for (&l, &r) in left.iter().zip(right) {
            writer.write_sample(to_i16(l))?;
            writer.write_sample(to_i16(r))?;
        }
        Ok(())
    })?;
    info!(path = %path.display(), frames = left.len(), "wrote stereo wav");
    Ok(())
}
