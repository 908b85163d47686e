//! dvbsub-dump: decode a captured subtitle PES stream to the terminal.
//!
//! Reads a file of concatenated subtitle PES packets (as filtered from a
//! transport stream), decodes every display set, and prints each picture
//! as soon as it is composed. The video clock is simulated so that every
//! picture is due immediately.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use dvbsub::{
    DvbSubDecoder, ErrorKind, Picture, RegionContent, SubtitleCallbacks, VideoClock,
};

/// dvbsub-dump - print decoded DVB subtitle pictures
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File of concatenated subtitle PES packets
    input: PathBuf,

    /// Composition page id from the subtitling descriptor
    #[arg(long, default_value = "1")]
    composition_page: u16,

    /// Ancillary page id from the subtitling descriptor
    #[arg(long, default_value = "1")]
    ancillary_page: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// A clock that makes every picture due the moment it is queued.
struct ImmediateClock;

impl VideoClock for ImmediateClock {
    fn current_video_clock(&self, candidate_pts: u64) -> u64 {
        candidate_pts
    }
}

struct PrintPictures;

impl SubtitleCallbacks for PrintPictures {
    fn show(&self, picture: Option<Arc<Picture>>) {
        let Some(picture) = picture else {
            println!("display cleared");
            return;
        };
        println!(
            "picture pts={} timeout={}s display={}x{} regions={}",
            picture.pts,
            picture.timeout,
            picture.display_width,
            picture.display_height,
            picture.regions.len()
        );
        for region in &picture.regions {
            match &region.content {
                RegionContent::Bitmap { pixels, palette } => {
                    let opaque = pixels
                        .iter()
                        .filter(|&&p| palette.get(p as usize).map_or(false, |c| c.a > 0))
                        .count();
                    println!(
                        "  bitmap at ({}, {}) {}x{}, {} opaque pixels",
                        region.left, region.top, region.width, region.height, opaque
                    );
                }
                RegionContent::Text { codes, .. } => {
                    println!("  text at ({}, {}): {:04X?}", region.left, region.top, codes);
                }
            }
        }
    }

    fn report_error(&self, kind: ErrorKind) {
        warn!("[dump] decoder reported {:?}", kind);
    }
}

/// Split a capture into PES packets using the declared packet lengths.
fn split_pes_packets(data: &[u8]) -> Vec<&[u8]> {
    let mut packets = Vec::new();
    let mut offset = 0;
    while offset + 6 <= data.len() {
        if data[offset] != 0x00 || data[offset + 1] != 0x00 || data[offset + 2] != 0x01 {
            // Resynchronize on the next start code.
            offset += 1;
            continue;
        }
        let length = u16::from_be_bytes([data[offset + 4], data[offset + 5]]) as usize;
        let end = offset + 6 + length;
        if end > data.len() {
            warn!("[dump] trailing truncated packet at byte {}", offset);
            break;
        }
        packets.push(&data[offset..end]);
        offset = end;
    }
    packets
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    let data = match std::fs::read(&args.input) {
        Ok(data) => data,
        Err(e) => {
            error!("[dump] cannot read {}: {}", args.input.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let packets = split_pes_packets(&data);
    info!("[dump] {} PES packets in {}", packets.len(), args.input.display());

    let mut decoder = DvbSubDecoder::new(
        args.composition_page,
        args.ancillary_page,
        Arc::new(PrintPictures),
        Arc::new(ImmediateClock),
    );
    if let Err(e) = decoder.start() {
        error!("[dump] {}", e);
        return ExitCode::FAILURE;
    }

    let mut rejected = 0usize;
    for packet in &packets {
        if let Err(e) = decoder.submit_packet(packet) {
            warn!("[dump] packet rejected: {}", e);
            rejected += 1;
        }
    }
    // Give the scheduler a moment to drain the queue.
    std::thread::sleep(Duration::from_millis(200));
    decoder.stop();

    if rejected == packets.len() && !packets.is_empty() {
        error!("[dump] no packet could be decoded");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
