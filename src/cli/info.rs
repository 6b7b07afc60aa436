use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Result, bail};
use codec_parser::{Codec, CodecHeader, CodecListener, Parsed};
use indicatif::MultiProgress;

use super::command::{Cli, InfoArgs};
use super::{create_parser, drive};
use crate::timestamp::time_str;

#[derive(Debug, Default)]
struct StreamState {
    codec: Option<Codec>,
    first_header: Option<CodecHeader>,
    updates: Vec<(f64, CodecHeader)>,
}

/// Collects parser notifications for the summary.
#[derive(Debug, Default, Clone)]
struct InfoListener {
    state: Rc<RefCell<StreamState>>,
}

impl CodecListener for InfoListener {
    fn on_codec(&mut self, codec: Codec) {
        self.state.borrow_mut().codec = Some(codec);
    }

    fn on_codec_header(&mut self, header: &CodecHeader) {
        self.state.borrow_mut().first_header = Some(header.clone());
    }

    fn on_codec_update(&mut self, header: &CodecHeader, timestamp: f64) {
        log::debug!("Codec configuration change at {}", time_str(timestamp));
        self.state
            .borrow_mut()
            .updates
            .push((timestamp, header.clone()));
    }
}

#[derive(Debug, Default)]
struct Totals {
    frames: u64,
    pages: u64,
    samples: u64,
    duration: f64,
    bytes: u64,
}

impl Totals {
    fn add(&mut self, parsed: &Parsed) {
        if let Parsed::OggPage(_) = parsed {
            self.pages += 1;
        }

        for frame in parsed.frames() {
            self.frames += 1;
            self.samples += frame.samples as u64;
            // the parser keeps the running total; only the last frame is added
            self.duration = frame.stats.total_duration + frame.duration;
            self.bytes += frame.data.len() as u64;
        }
    }
}

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing stream: {}", args.input.display());

    let mut parser = create_parser(&args.input, cli)?;
    let listener = InfoListener::default();
    parser.set_listener(Box::new(listener.clone()));

    let mut totals = Totals::default();
    let total_in = drive(&args.input, &mut parser, multi, |_, parsed| {
        totals.add(&parsed);
        Ok(true)
    })?;

    let state = listener.state.borrow();
    let Some(header) = &state.first_header else {
        if cli.strict {
            bail!("No frames could be synchronized in {}", args.input.display());
        }
        println!("No frames could be synchronized in the input.");
        return Ok(());
    };

    println!();
    println!("Stream Information");
    println!("==================");
    println!();
    if let Some(codec) = state.codec {
        println!("  Codec                     {codec}");
    }
    display_audio(header);
    display_codec_details(header);
    println!();

    if state.updates.len() > 1 {
        println!("Configuration Changes");
        for (timestamp, header) in &state.updates[1..] {
            let audio = header.audio();
            print!(
                "  {}    {} Hz, {} channels",
                time_str(*timestamp),
                audio.sample_rate,
                audio.channels
            );
            match audio.bitrate {
                Some(bitrate) => println!(", {bitrate} kbps"),
                None => println!(),
            }
        }
        println!();
    }

    display_summary(&totals, total_in);

    Ok(())
}

fn display_audio(header: &CodecHeader) {
    let audio = header.audio();

    println!("  Sample rate               {} Hz", audio.sample_rate);
    println!("  Channels                  {} ({})", audio.channels, audio.channel_mode);
    println!("  Bit depth                 {}", audio.bit_depth);
    if let Some(bitrate) = audio.bitrate {
        println!("  Bitrate                   {bitrate} kbps");
    }
}

fn display_codec_details(header: &CodecHeader) {
    match header {
        CodecHeader::Mpeg(h) => {
            println!("  Version                   {}", h.version);
            println!("  Layer                     {}", h.layer);
            println!("  Protection                {}", h.protection);
            println!("  Mode extension            {}", h.mode_extension);
            println!("  Emphasis                  {}", h.emphasis);
        }
        CodecHeader::Aac(h) => {
            println!("  MPEG version              {:?}", h.mpeg_version);
            println!("  Profile                   {}", h.profile);
            println!("  Channel configuration     {}", h.channel_configuration);
            let fullness = h
                .buffer_fullness
                .map_or("VBR".to_string(), |fullness| fullness.to_string());
            println!("  Buffer fullness           {fullness}");
        }
        CodecHeader::Flac(h) => {
            println!("  Blocking strategy         {:?}", h.blocking_strategy);
            println!("  Block size                {}", h.block_size);
            if let Some(info) = &h.stream_info {
                println!(
                    "  Block size range          {} - {}",
                    info.min_block_size, info.max_block_size
                );
                println!("  Total samples             {}", info.total_samples);
            }
        }
        CodecHeader::Opus(h) => {
            println!("  Pre-skip                  {}", h.pre_skip);
            println!("  Input sample rate         {} Hz", h.input_sample_rate);
            println!("  Output gain               {:.2} dB", h.output_gain as f64 / 256.0);
            println!("  Channel mapping family    {}", h.channel_mapping_family);
            if let Some(toc) = &h.toc {
                println!("  Mode                      {}", toc.mode);
                println!("  Bandwidth                 {}", toc.bandwidth);
                println!("  Frame duration            {} ms", toc.frame_duration());
            }
        }
        CodecHeader::Vorbis(h) => {
            println!("  Block sizes               {} / {}", h.blocksize0, h.blocksize1);
            println!(
                "  Bitrate min/nom/max       {} / {} / {}",
                h.bitrate_minimum, h.bitrate_nominal, h.bitrate_maximum
            );
        }
    }
}

fn display_summary(totals: &Totals, total_in: u64) {
    println!("Analysis Summary");
    println!("  Frames processed          {}", totals.frames);
    if totals.pages > 0 {
        println!("  Ogg pages                 {}", totals.pages);
    }
    println!("  Samples                   {}", totals.samples);

    let size_mb = total_in as f64 / 1_000_000.0;
    println!("  Size                      {size_mb:.2} MB ({total_in} bytes)");
    println!("  Duration                  {}", time_str(totals.duration));

    if totals.duration > 0.0 {
        let avg_data_rate_kbps = totals.bytes as f64 * 8.0 / totals.duration;
        println!("  Average data rate         {avg_data_rate_kbps:.1} kbps");
    }

    println!();
}
