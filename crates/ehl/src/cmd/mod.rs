use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use ehl_channel::{Bus, ChannelConfig};
use ehl_frame::{Address, CommandCode, Packet};
use ehl_transport::{SerialConfig, SerialTransport, DEFAULT_BAUD_RATE};

use crate::exit::{frame_error, transport_error, CliError, CliResult, USAGE};
use crate::output::{parse_hex, OutputFormat};

pub mod decode;
pub mod encode;
pub mod monitor;
pub mod ports;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a frame and print its bytes.
    Encode(EncodeArgs),
    /// Parse frame bytes given as hex.
    Decode(DecodeArgs),
    /// Send one command to a dispenser and print the response.
    Send(SendArgs),
    /// Print every frame seen on the bus until interrupted.
    Monitor(MonitorArgs),
    /// List serial ports.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SerialArgs {
    /// Serial device (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, short = 'p', env = "EHL_PORT")]
    pub port: String,
    /// Line speed in baud.
    #[arg(long, env = "EHL_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

#[derive(Args, Debug)]
pub struct PacketArgs {
    /// Dispenser address (1-255).
    #[arg(long, short = 'a', value_parser = clap::value_parser!(u8).range(1..))]
    pub address: u8,
    /// Command mnemonic (STATE, PROG_PRC, ...) or numeric code.
    #[arg(long, short = 'c', value_parser = parse_command)]
    pub command: CommandCode,
    /// Command data as hex (e.g. "00 45 90").
    #[arg(long, short = 'd', default_value = "")]
    pub data: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub packet: PacketArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex; multiple arguments are concatenated.
    #[arg(required = true, num_args = 1..)]
    pub hex: Vec<String>,
    /// Treat the input as a raw byte stream: skip garbage and print every frame found.
    #[arg(long)]
    pub stream: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub serial: SerialArgs,
    #[command(flatten)]
    pub packet: PacketArgs,
    /// How long to wait for the response (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub serial: SerialArgs,
    /// Only print frames from these addresses (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub addresses: Option<Vec<u8>>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_command(input: &str) -> Result<CommandCode, String> {
    let input = input.trim();
    if let Some(code) = CommandCode::from_name(input) {
        return Ok(code);
    }
    let numeric = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    numeric
        .map(CommandCode::from_code)
        .map_err(|_| format!("unknown command {input:?} (use a mnemonic or a code 0-255)"))
}

impl PacketArgs {
    pub fn to_packet(&self) -> CliResult<Packet> {
        let address =
            Address::new(self.address).map_err(|err| frame_error("invalid address", err))?;
        let data = parse_hex(&self.data)?;
        Packet::new(address, self.command, data).map_err(|err| frame_error("invalid packet", err))
    }
}

pub fn open_bus(
    serial: &SerialArgs,
    response_timeout: Duration,
) -> CliResult<Arc<Bus<SerialTransport>>> {
    let config = SerialConfig {
        baud_rate: serial.baud,
        ..SerialConfig::new(serial.port.clone())
    };
    let transport =
        SerialTransport::open(config).map_err(|err| transport_error("open failed", err))?;
    let channel_config = ChannelConfig {
        response_timeout,
        ..ChannelConfig::default()
    };
    Ok(Arc::new(Bus::with_config(transport, channel_config)))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
