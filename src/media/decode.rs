//! Audio decoding: arbitrary container/codec → mono f32 PCM at a fixed sample
//! rate, truncated to a fixed head duration.
//!
//! Grounded in symphonia's probe/decode loop and rubato's `FftFixedIn`
//! resampler, the same pairing the reference catalog loader uses.

use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::MatcherError;

/// Decode the first `probe_seconds` of audio, discarding the result. Used as
/// a cheap corruption check before committing to a full decode (spec 4.A.3).
pub fn probe_decodable(path: &Path, probe_seconds: f32, sample_rate: u32) -> Result<(), MatcherError> {
    let want_samples = (sample_rate as f32 * probe_seconds).ceil() as usize;
    let mut got = 0usize;
    decode_frames(path, |mono_frame| {
        got += 1;
        // mono_frame callback is invoked once per decoded sample in our simple
        // reader; stop as soon as we've seen enough to call it readable.
        got < want_samples.max(1)
    })?;
    if got == 0 {
        return Err(MatcherError::DecodeFailed("no samples decoded during probe".into()));
    }
    Ok(())
}

/// Decode the full file to mono f32 PCM, resample to `target_rate`, and
/// truncate to `head_seconds`. Rejects empty output or any NaN/Inf sample.
pub fn decode_head(
    path: &Path,
    target_rate: u32,
    head_seconds: f32,
) -> Result<Vec<f32>, MatcherError> {
    let (samples, source_rate) = decode_all(path)?;
    if samples.is_empty() {
        return Err(MatcherError::DecodeFailed("empty decoded audio".into()));
    }

    let resampled = if source_rate == target_rate {
        samples
    } else {
        resample(&samples, source_rate, target_rate)
    };

    let max_len = (target_rate as f32 * head_seconds) as usize;
    let mut head = if resampled.len() > max_len {
        resampled[..max_len].to_vec()
    } else {
        resampled
    };

    if head.is_empty() {
        return Err(MatcherError::DecodeFailed("empty audio after resample".into()));
    }
    if head.iter().any(|s| !s.is_finite()) {
        return Err(MatcherError::DecodeFailed("non-finite sample in decoded audio".into()));
    }
    // Defensive: clamp any denormal edge case introduced by resampling.
    for s in &mut head {
        if !s.is_finite() {
            *s = 0.0;
        }
    }
    Ok(head)
}

/// Decode a whole file to mono f32 at its native sample rate.
fn decode_all(path: &Path) -> Result<(Vec<f32>, u32), MatcherError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MatcherError::DecodeFailed(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| MatcherError::DecodeFailed("no audio track found".into()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_rate = codec_params.sample_rate.unwrap_or(44_100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| MatcherError::DecodeFailed(e.to_string()))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(_) => break,
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };
        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let n_frames = decoded.capacity();
        let mut sample_buf = SampleBuffer::<f32>::new(n_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        for frame in sample_buf.samples().chunks(channels) {
            let mono: f32 = frame.iter().sum::<f32>() / channels as f32;
            all_samples.push(mono);
        }
    }

    if all_samples.is_empty() {
        return Err(MatcherError::DecodeFailed("empty audio".into()));
    }

    Ok((all_samples, source_rate))
}

/// Walk decoded mono samples one at a time, calling `on_sample` for each;
/// stop as soon as it returns `false`. Returns the source sample rate.
/// Used by `probe_decodable` so a corrupted file fails fast without decoding
/// the whole stream.
fn decode_frames(path: &Path, mut on_sample: impl FnMut(f32) -> bool) -> Result<u32, MatcherError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MatcherError::DecodeFailed(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| MatcherError::DecodeFailed("no audio track found".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_rate = codec_params.sample_rate.unwrap_or(44_100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| MatcherError::DecodeFailed(e.to_string()))?;

    'outer: loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(_) => break,
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };
        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let n_frames = decoded.capacity();
        let mut sample_buf = SampleBuffer::<f32>::new(n_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        for frame in sample_buf.samples().chunks(channels) {
            let mono: f32 = frame.iter().sum::<f32>() / channels as f32;
            if !on_sample(mono) {
                break 'outer;
            }
        }
    }

    Ok(source_rate)
}

/// High-quality resampling via sinc interpolation (rubato).
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    use rubato::{FftFixedIn, Resampler};

    let ratio = to_rate as f64 / from_rate as f64;
    let chunk_size = 1024;

    let mut resampler = match FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, chunk_size, 2, 1) {
        Ok(r) => r,
        Err(_) => return samples.to_vec(),
    };

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + chunk_size);

    let mut pos = 0;
    while pos + chunk_size <= samples.len() {
        let chunk = vec![samples[pos..pos + chunk_size].to_vec()];
        if let Ok(out) = resampler.process(&chunk, None) {
            if let Some(ch) = out.first() {
                output.extend_from_slice(ch);
            }
        }
        pos += chunk_size;
    }

    if pos < samples.len() {
        let remaining = samples.len() - pos;
        let mut padded = samples[pos..].to_vec();
        padded.resize(chunk_size, 0.0);
        let chunk = vec![padded];
        if let Ok(out) = resampler.process(&chunk, None) {
            if let Some(ch) = out.first() {
                let take = ((remaining as f64 * ratio) as usize).min(ch.len());
                output.extend_from_slice(&ch[..take]);
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::io::Write;

    fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
        let mut f = std::fs::File::create(path).unwrap();
        let data_len = (samples.len() * 2) as u32;
        f.write_all(b"RIFF").unwrap();
        f.write_all(&(36 + data_len).to_le_bytes()).unwrap();
        f.write_all(b"WAVEfmt ").unwrap();
        f.write_all(&16u32.to_le_bytes()).unwrap();
        f.write_all(&1u16.to_le_bytes()).unwrap(); // PCM
        f.write_all(&1u16.to_le_bytes()).unwrap(); // mono
        f.write_all(&sample_rate.to_le_bytes()).unwrap();
        f.write_all(&(sample_rate * 2).to_le_bytes()).unwrap();
        f.write_all(&2u16.to_le_bytes()).unwrap();
        f.write_all(&16u16.to_le_bytes()).unwrap();
        f.write_all(b"data").unwrap();
        f.write_all(&data_len.to_le_bytes()).unwrap();
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            f.write_all(&v.to_le_bytes()).unwrap();
        }
    }

    fn sine(freq: f32, secs: f32, rate: u32) -> Vec<f32> {
        let n = (rate as f32 * secs) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn decode_head_truncates_and_resamples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &sine(440.0, 3.0, 44_100), 44_100);

        let head = decode_head(&path, 22_050, 1.0).unwrap();
        assert!((head.len() as i64 - 22_050).abs() < 200);
        assert!(head.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn probe_decodable_succeeds_on_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &sine(440.0, 1.0, 22_050), 22_050);
        probe_decodable(&path, 0.1, 22_050).unwrap();
    }

    #[test]
    fn probe_decodable_fails_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"not an audio file at all, just bytes").unwrap();
        assert!(probe_decodable(&path, 0.1, 22_050).is_err());
    }
}
