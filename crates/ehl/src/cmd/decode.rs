use ehl_frame::{decode, FrameAssembler, Packet, ParseResult};
use tracing::{info, warn};

use crate::cmd::DecodeArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{parse_hex, print_packet, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex.join(" "))?;

    let packets = if args.stream {
        decode_stream(&bytes)?
    } else {
        vec![decode_single(&bytes)?]
    };

    for packet in &packets {
        print_packet(packet, format);
    }
    Ok(SUCCESS)
}

fn decode_single(bytes: &[u8]) -> CliResult<Packet> {
    match decode(bytes) {
        ParseResult::Success(packet) => {
            let extra = bytes.len() - packet.frame_len();
            if extra > 0 {
                warn!(extra, "ignoring bytes after the first frame");
            }
            Ok(packet)
        }
        ParseResult::ChecksumError { expected, actual } => Err(CliError::new(
            DATA_INVALID,
            format!("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}"),
        )),
        ParseResult::InvalidFormat(reason) => Err(CliError::new(
            DATA_INVALID,
            format!("invalid frame: {reason}"),
        )),
        ParseResult::Incomplete => Err(CliError::new(
            DATA_INVALID,
            format!("incomplete frame ({} bytes)", bytes.len()),
        )),
    }
}

fn decode_stream(bytes: &[u8]) -> CliResult<Vec<Packet>> {
    let mut assembler = FrameAssembler::new();
    assembler.push(bytes);
    let packets = assembler.drain();

    let stats = assembler.stats();
    info!(
        frames = stats.frames,
        resync_bytes = stats.resync_bytes,
        checksum_errors = stats.checksum_errors,
        format_errors = stats.format_errors,
        leftover = assembler.buffered(),
        "stream decoded"
    );

    if packets.is_empty() {
        return Err(CliError::new(DATA_INVALID, "no complete frame in input"));
    }
    Ok(packets)
}
