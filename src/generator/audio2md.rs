use hound::WavReader;
use std::io::Cursor;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

/// Properties gathered from the stream, rendered as the Markdown body.
#[derive(Debug, Default)]
struct AudioInfo {
    format: String,
    duration_secs: Option<f64>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
    bits_per_sample: Option<u32>,
    tags: Vec<(String, String)>,
}

pub fn run(file_stream: &[u8], extension: Option<&str>) -> Result<String, String> {
    let info = match extension {
        Some("wav") => wav_info(file_stream).or_else(|e| {
            log::debug!("hound could not read WAV ({}), probing with symphonia", e);
            probe_info(file_stream, extension)
        })?,
        _ => probe_info(file_stream, extension)?,
    };
    Ok(render(&info))
}

fn wav_info(stream: &[u8]) -> Result<AudioInfo, String> {
    let reader =
        WavReader::new(Cursor::new(stream)).map_err(|e| format!("Failed to read WAV stream: {}", e))?;
    let spec = reader.spec();
    let duration = if spec.sample_rate > 0 {
        Some(reader.duration() as f64 / spec.sample_rate as f64)
    } else {
        None
    };

    let sample_format = match spec.sample_format {
        hound::SampleFormat::Int => "PCM",
        hound::SampleFormat::Float => "IEEE float",
    };

    Ok(AudioInfo {
        format: format!("WAV ({})", sample_format),
        duration_secs: duration,
        sample_rate: Some(spec.sample_rate),
        channels: Some(spec.channels),
        bits_per_sample: Some(spec.bits_per_sample as u32),
        tags: Vec::new(),
    })
}

fn probe_info(stream: &[u8], extension: Option<&str>) -> Result<AudioInfo, String> {
    // Create a cursor from input bytes (clone to owned Vec to satisfy lifetime requirements)
    let cursor = Cursor::new(stream.to_vec());
    let media_source = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let mut probed = get_probe()
        .format(&hint, media_source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| format!("Unsupported audio format: {}", e))?;

    let mut tags = Vec::new();
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            tags.extend(collect_tags(revision));
        }
    }
    let mut format_reader = probed.format;
    if let Some(revision) = format_reader.metadata().current() {
        tags.extend(collect_tags(revision));
    }

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "No audio track found".to_string())?;

    let params = track.codec_params.clone();
    let track_id = track.id;
    let codec_name = get_codecs()
        .get_codec(params.codec)
        .map(|descriptor| descriptor.long_name.to_string())
        .unwrap_or_else(|| "unknown codec".to_string());

    let sample_rate = params.sample_rate;
    let frames = match params.n_frames {
        Some(frames) => Some(frames),
        // No frame count in the header (VBR mp3 without Xing): add up packet durations.
        None => {
            let mut total = 0u64;
            loop {
                match format_reader.next_packet() {
                    Ok(packet) if packet.track_id() == track_id => total += packet.dur,
                    Ok(_) => {}
                    Err(SymphoniaError::IoError(err))
                        if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        break;
                    }
                    Err(err) => {
                        log::debug!("stopped counting packets: {}", err);
                        break;
                    }
                }
            }
            (total > 0).then_some(total)
        }
    };
    let duration_secs = match (frames, sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => Some(frames as f64 / rate as f64),
        _ => None,
    };

    Ok(AudioInfo {
        format: codec_name,
        duration_secs,
        sample_rate,
        channels: params.channels.map(|c| c.count() as u16),
        bits_per_sample: params.bits_per_sample,
        tags,
    })
}

fn collect_tags(revision: &MetadataRevision) -> Vec<(String, String)> {
    revision
        .tags()
        .iter()
        .filter_map(|tag| {
            let label = match tag.std_key.as_ref()? {
                StandardTagKey::TrackTitle => "Title",
                StandardTagKey::Artist => "Artist",
                StandardTagKey::Album => "Album",
                StandardTagKey::AlbumArtist => "Album Artist",
                StandardTagKey::Genre => "Genre",
                StandardTagKey::Date => "Date",
                StandardTagKey::TrackNumber => "Track",
                StandardTagKey::Composer => "Composer",
                StandardTagKey::Comment => "Comment",
                _ => return None,
            };
            Some((label.to_string(), tag.value.to_string()))
        })
        .collect()
}

fn format_duration(secs: f64) -> String {
    let total = secs.round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn render(info: &AudioInfo) -> String {
    let mut markdown = String::from("# Audio\n\n## Basic Information\n");
    markdown.push_str(&format!("- **Format**: {}\n", info.format));
    if let Some(secs) = info.duration_secs {
        markdown.push_str(&format!("- **Duration**: {}\n", format_duration(secs)));
    }
    if let Some(rate) = info.sample_rate {
        markdown.push_str(&format!("- **Sample Rate**: {} Hz\n", rate));
    }
    if let Some(channels) = info.channels {
        markdown.push_str(&format!("- **Channels**: {}\n", channels));
    }
    if let Some(bits) = info.bits_per_sample {
        markdown.push_str(&format!("- **Bit Depth**: {}-bit\n", bits));
    }

    if !info.tags.is_empty() {
        markdown.push_str("\n## Tags\n");
        for (label, value) in &info.tags {
            markdown.push_str(&format!("- **{}**: {}\n", label, value));
        }
    }
    markdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn one_second_wav() -> Vec<u8> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut wav_data = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut wav_data), spec).unwrap();
            for i in 0..16000 {
                writer.write_sample(((i % 100) as i16 - 50) * 100).unwrap();
            }
            writer.finalize().unwrap();
        }
        wav_data
    }

    #[test]
    fn test_wav_properties() {
        let md = run(&one_second_wav(), Some("wav")).unwrap();
        assert!(md.starts_with("# Audio\n\n## Basic Information\n"));
        assert!(md.contains("- **Format**: WAV (PCM)\n"));
        assert!(md.contains("- **Duration**: 00:00:01\n"));
        assert!(md.contains("- **Sample Rate**: 16000 Hz\n"));
        assert!(md.contains("- **Channels**: 1\n"));
        assert!(md.contains("- **Bit Depth**: 16-bit\n"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.4), "00:00:00");
        assert_eq!(format_duration(3725.0), "01:02:05");
    }

    #[test]
    fn test_not_audio() {
        assert!(run(b"this is not audio at all", Some("mp3")).is_err());
    }
}
