//! Audio I/O: decode/encode byte streams, WAV files, format conversion.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::buffer::{AudioBuffer, SampleSpec, REFERENCE_SPEC};
use crate::error::{GreetError, Result};

/// Container formats [`encode`] can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// RIFF/WAVE, integer PCM at the buffer's bit depth.
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
        }
    }
}

/// Decode an encoded byte stream.
///
/// `format_hint` is a file extension ("wav", "mp3", "m4a", ...). WAV is read
/// directly with hound; anything else goes through symphonia's probe.
pub fn decode(bytes: &[u8], format_hint: Option<&str>) -> Result<AudioBuffer> {
    if bytes.is_empty() {
        return Err(GreetError::Decode("empty input".into()));
    }

    let is_wav = format_hint
        .map(|h| h.trim_start_matches('.').eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
        || bytes.starts_with(b"RIFF");

    if is_wav {
        match decode_wav(bytes) {
            Ok(buf) => return Ok(buf),
            // WAVE_FORMAT_EXTENSIBLE and friends: let symphonia try
            Err(e) => log::debug!("hound could not read WAV ({}), probing", e),
        }
    }

    decode_probed(bytes, format_hint)
}

/// Read and decode an audio file from disk.
pub fn read_audio_file(path: &Path) -> Result<AudioBuffer> {
    let bytes = std::fs::read(path)?;
    let hint = path.extension().and_then(|e| e.to_str());
    decode(&bytes, hint)
}

fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| v as f64))
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    Ok(AudioBuffer::new(
        samples,
        SampleSpec::new(spec.sample_rate, spec.channels, spec.bits_per_sample),
    ))
}

fn decode_probed(bytes: &[u8], format_hint: Option<&str>) -> Result<AudioBuffer> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let source = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = format_hint {
        hint.with_extension(ext.trim_start_matches('.'));
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| GreetError::Decode(format!("unsupported format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| GreetError::Decode("no audio track found".into()))?;

    let track_id = track.id;
    let source_sr = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1)
        .max(1);
    let bits = track.codec_params.bits_per_sample.unwrap_or(16) as u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| GreetError::Decode(format!("unsupported codec: {}", e)))?;

    let mut all_samples: Vec<f64> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphError::ResetRequired) => break,
            Err(e) => return Err(GreetError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut sample_buf = SampleBuffer::<f64>::new(decoded.frames() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                all_samples.extend_from_slice(sample_buf.samples());
            }
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(GreetError::Decode(e.to_string())),
        }
    }

    if all_samples.is_empty() {
        return Err(GreetError::Decode("no audio decoded".into()));
    }

    Ok(AudioBuffer::new(
        all_samples,
        SampleSpec::new(source_sr, channels as u16, bits),
    ))
}

/// Encode a buffer into `format`.
///
/// Samples are clipped to [-1, 1] before quantisation.
pub fn encode(buf: &AudioBuffer, format: AudioFormat) -> Result<Vec<u8>> {
    match format {
        AudioFormat::Wav => encode_wav(buf),
    }
}

fn encode_wav(buf: &AudioBuffer) -> Result<Vec<u8>> {
    let bits = match buf.bits_per_sample() {
        8 | 16 | 24 | 32 => buf.bits_per_sample(),
        _ => 16,
    };
    let spec = WavSpec {
        channels: buf.channels(),
        sample_rate: buf.sample_rate(),
        bits_per_sample: bits,
        sample_format: SampleFormat::Int,
    };

    let max_val = ((1i64 << (bits - 1)) - 1) as f64;
    let mut cursor = Cursor::new(Vec::with_capacity(buf.samples().len() * bits as usize / 8 + 44));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in buf.samples() {
            let clipped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clipped * max_val).round() as i32)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Write a buffer to a WAV file. Creates parent directories if needed.
pub fn write_wav(path: &Path, buf: &AudioBuffer) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = encode(buf, AudioFormat::Wav)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Resample one channel from `from_sr` to `to_sr`.
///
/// Uses rubato for high-quality resampling.
pub fn resample(samples: &[f64], from_sr: u32, to_sr: u32) -> Result<Vec<f64>> {
    if from_sr == to_sr {
        return Ok(samples.to_vec());
    }

    if samples.is_empty() {
        return Ok(vec![]);
    }

    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_sr as f64 / from_sr as f64;
    let mut resampler = SincFixedIn::<f64>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| GreetError::Decode(format!("resampler setup failed: {}", e)))?;

    let input = vec![samples.to_vec()];
    let output = resampler
        .process(&input, None)
        .map_err(|e| GreetError::Decode(format!("resampling failed: {}", e)))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// Convert a buffer to the given rate, channel count and bit depth.
///
/// Down-mixing averages channels; up-mixing duplicates the mono signal.
/// Changing bit depth re-quantises samples onto the coarser grid.
pub fn resample_normalize(buf: &AudioBuffer, target: SampleSpec) -> Result<AudioBuffer> {
    if buf.spec() == target {
        return Ok(buf.clone());
    }

    let planes = buf.deinterleave();
    let target_channels = target.channels.max(1) as usize;

    // Channel conversion first, so the resampler runs on as few planes as possible
    let planes: Vec<Vec<f64>> = if planes.len() == target_channels {
        planes
    } else if target_channels == 1 {
        let frames = buf.frames();
        let n = planes.len().max(1) as f64;
        vec![(0..frames)
            .map(|i| planes.iter().map(|p| p[i]).sum::<f64>() / n)
            .collect()]
    } else {
        let mono: Vec<f64> = if planes.len() == 1 {
            planes[0].clone()
        } else {
            let frames = buf.frames();
            let n = planes.len() as f64;
            (0..frames)
                .map(|i| planes.iter().map(|p| p[i]).sum::<f64>() / n)
                .collect()
        };
        vec![mono; target_channels]
    };

    let planes = planes
        .iter()
        .map(|p| resample(p, buf.sample_rate(), target.sample_rate))
        .collect::<Result<Vec<_>>>()?;

    let mut out = AudioBuffer::from_planes(&planes, target);
    if target.bits_per_sample != buf.bits_per_sample() {
        quantize(out.samples_mut(), target.bits_per_sample);
    }
    Ok(out)
}

/// Convert to the voice-reference format (22.05 kHz, mono, 16-bit).
pub fn to_reference_format(buf: &AudioBuffer) -> Result<AudioBuffer> {
    resample_normalize(buf, REFERENCE_SPEC)
}

fn quantize(samples: &mut [f64], bits: u16) {
    if bits == 0 || bits > 32 {
        return;
    }
    let q = (1i64 << (bits - 1)) as f64;
    for s in samples.iter_mut() {
        *s = (*s * q).round().clamp(-q, q - 1.0) / q;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, n: usize, sr: u32) -> Vec<f64> {
        (0..n)
            .map(|i| (i as f64 / sr as f64 * freq * std::f64::consts::TAU).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_wav_encode_decode_roundtrip() {
        let buf = AudioBuffer::mono(sine(440.0, 1000, 16000), 16000);
        let bytes = encode(&buf, AudioFormat::Wav).unwrap();
        assert!(bytes.starts_with(b"RIFF"));

        let decoded = decode(&bytes, Some("wav")).unwrap();
        assert_eq!(decoded.spec(), buf.spec());
        assert_eq!(decoded.frames(), buf.frames());

        // 16-bit quantization introduces small error
        for (a, b) in buf.samples().iter().zip(decoded.samples()) {
            assert!((a - b).abs() < 0.001, "sample mismatch: {} vs {}", a, b);
        }
    }

    #[test]
    fn test_decode_sniffs_riff_without_hint() {
        let buf = AudioBuffer::new(vec![0.25; 200], SampleSpec::new(8000, 2, 16));
        let bytes = encode(&buf, AudioFormat::Wav).unwrap();
        let decoded = decode(&bytes, None).unwrap();
        assert_eq!(decoded.channels(), 2);
        assert_eq!(decoded.frames(), 100);
    }

    #[test]
    fn test_encode_clips_values() {
        let buf = AudioBuffer::mono(vec![-2.0, -1.0, 0.0, 1.0, 2.0], 16000);
        let decoded = decode(&encode(&buf, AudioFormat::Wav).unwrap(), None).unwrap();
        let s = decoded.samples();
        assert!(s[0] >= -1.0 && s[0] <= -0.99);
        assert!(s[4] >= 0.99 && s[4] <= 1.0);
    }

    #[test]
    fn test_decode_empty_is_error() {
        assert!(matches!(decode(&[], None), Err(GreetError::Decode(_))));
    }

    #[test]
    fn test_decode_garbage_is_error() {
        let garbage = b"definitely not audio at all, just some bytes".to_vec();
        assert!(matches!(decode(&garbage, Some("mp3")), Err(GreetError::Decode(_))));
    }

    #[test]
    fn test_write_wav_creates_parents() {
        let dir = std::env::temp_dir().join(format!("greetcast_io_{}", std::process::id()));
        let path = dir.join("nested").join("out.wav");
        let buf = AudioBuffer::mono(vec![0.0; 160], 16000);
        write_wav(&path, &buf).unwrap();

        let read = read_audio_file(&path).unwrap();
        assert_eq!(read.frames(), 160);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(resample(&samples, 16000, 16000).unwrap(), samples);
    }

    #[test]
    fn test_resample_upsample() {
        let samples = sine(100.0, 4000, 8000);
        let result = resample(&samples, 8000, 16000).unwrap();
        // Sinc resampler loses samples at edges due to filter length; allow wide tolerance
        assert!(result.len() >= 7000 && result.len() <= 8500,
            "Expected ~8000 samples, got {}", result.len());
    }

    #[test]
    fn test_resample_empty() {
        assert!(resample(&[], 16000, 8000).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_downmixes_stereo() {
        let buf = AudioBuffer::new(vec![0.5, -0.5, 1.0, 0.0], SampleSpec::new(22050, 2, 16));
        let out = resample_normalize(&buf, SampleSpec::new(22050, 1, 16)).unwrap();
        assert_eq!(out.channels(), 1);
        assert_eq!(out.samples(), &[0.0, 0.5]);
    }

    #[test]
    fn test_normalize_upmixes_mono() {
        let buf = AudioBuffer::mono(vec![0.25, 0.5], 8000);
        let out = resample_normalize(&buf, SampleSpec::new(8000, 2, 16)).unwrap();
        assert_eq!(out.samples(), &[0.25, 0.25, 0.5, 0.5]);
    }

    #[test]
    fn test_normalize_requantizes() {
        let buf = AudioBuffer::new(vec![0.123456789], SampleSpec::new(8000, 1, 32));
        let out = resample_normalize(&buf, SampleSpec::new(8000, 1, 8)).unwrap();
        assert_eq!(out.bits_per_sample(), 8);
        // 8-bit grid step is 1/128
        let scaled = out.samples()[0] * 128.0;
        assert!((scaled - scaled.round()).abs() < 1e-9);
    }

    #[test]
    fn test_to_reference_format() {
        let buf = AudioBuffer::new(sine(220.0, 44100 * 2, 44100), SampleSpec::new(44100, 2, 24));
        let out = to_reference_format(&buf).unwrap();
        assert_eq!(out.spec(), REFERENCE_SPEC);
        assert!(out.frames() > 20000 && out.frames() < 24000,
            "Expected ~22050 frames, got {}", out.frames());
    }
}
