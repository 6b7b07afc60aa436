use std::io::{self, BufWriter, Write};

use anyhow::{Result, bail};
use codec_parser::{Frame, FrameStats, OggPage, Parsed};
use indicatif::MultiProgress;
use serde::Serialize;

use super::command::{Cli, FramesArgs, OutputFormat};
use super::{create_parser, drive};

#[derive(Debug, Serialize)]
struct FrameRecord {
    frame_number: u64,
    length: usize,
    samples: u64,
    duration_ms: f64,
    total_bytes_out: u64,
    total_samples: u64,
    total_duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    crc32: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    codec: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<PageRecord>,
}

#[derive(Debug, Serialize)]
struct PageRecord {
    sequence: u32,
    serial: u32,
    granule: i64,
    codec_frames: usize,
}

impl FrameRecord {
    fn with_stats(stats: &FrameStats, length: usize, samples: u64, duration: f64) -> Self {
        Self {
            frame_number: stats.frame_number,
            length,
            samples,
            duration_ms: duration,
            total_bytes_out: stats.total_bytes_out,
            total_samples: stats.total_samples,
            total_duration_ms: stats.total_duration,
            crc32: stats.crc32.map(|crc| format!("{crc:08x}")),
            codec: None,
            sample_rate: None,
            channels: None,
            bitrate: None,
            page: None,
        }
    }

    fn from_frame(frame: &Frame) -> Self {
        let audio = frame.header.audio();

        Self {
            codec: Some(frame.header.codec().as_str()),
            sample_rate: Some(audio.sample_rate),
            channels: Some(audio.channels),
            bitrate: audio.bitrate,
            ..Self::with_stats(
                &frame.stats,
                frame.data.len(),
                frame.samples as u64,
                frame.duration,
            )
        }
    }

    fn from_page(page: &OggPage) -> Self {
        let mut record =
            Self::with_stats(&page.stats, page.raw_data.len(), page.samples, page.duration);

        if let Some(frame) = page.codec_frames.first() {
            let audio = frame.header.audio();
            record.codec = Some(frame.header.codec().as_str());
            record.sample_rate = Some(audio.sample_rate);
            record.channels = Some(audio.channels);
            record.bitrate = audio.bitrate;
        }

        record.page = Some(PageRecord {
            sequence: page.header.page_sequence_number,
            serial: page.header.stream_serial_number,
            granule: page.header.absolute_granule_position,
            codec_frames: page.codec_frames.len(),
        });

        record
    }
}

impl From<&Parsed> for FrameRecord {
    fn from(parsed: &Parsed) -> Self {
        match parsed {
            Parsed::Frame(frame) => Self::from_frame(frame),
            Parsed::OggPage(page) => Self::from_page(page),
        }
    }
}

fn write_record<W: Write>(out: &mut W, record: &FrameRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Yaml => {
            writeln!(out, "---")?;
            write!(out, "{}", serde_yaml_ng::to_string(record)?)?;
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string(record)?)?;
        }
    }

    Ok(())
}

pub fn cmd_frames(args: &FramesArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Listing frames: {}", args.input.display());

    let mut parser = create_parser(&args.input, cli)?;
    let mut out = BufWriter::new(io::stdout().lock());
    let mut records = 0usize;

    drive(&args.input, &mut parser, multi, |_, parsed| {
        if args.limit.is_some_and(|limit| records >= limit) {
            return Ok(false);
        }

        write_record(&mut out, &FrameRecord::from(&parsed), args.format)?;
        records += 1;

        Ok(args.limit.is_none_or(|limit| records < limit))
    })?;

    out.flush()?;

    if records == 0 {
        if cli.strict {
            bail!("No frames could be synchronized in {}", args.input.display());
        }
        log::warn!("No frames could be synchronized in the input");
    } else {
        log::info!("Wrote {records} records");
    }

    Ok(())
}
