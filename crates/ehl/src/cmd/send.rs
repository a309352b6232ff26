use std::sync::Arc;

use ehl_channel::{Bus, ChannelError};
use ehl_frame::Packet;
use ehl_transport::Transport;
use tracing::info;

use crate::cmd::{open_bus, parse_duration, SendArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let request = args.packet.to_packet()?;
    let bus = open_bus(&args.serial, timeout)?;

    let response = exchange(&bus, &request).map_err(|err| channel_error("send failed", err))?;
    print_packet(&response, format);
    Ok(SUCCESS)
}

fn exchange<T: Transport>(bus: &Arc<Bus<T>>, request: &Packet) -> Result<Packet, ChannelError> {
    let channel = bus.channel(request.address());
    let response = channel.send_and_await(request, bus.config().response_timeout)?;
    info!(
        request = %request,
        response = %response,
        "exchange complete"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use ehl_channel::ChannelConfig;
    use ehl_frame::{encode, Address, CommandCode, FrameAssembler};
    use ehl_transport::MemoryTransport;

    use super::*;

    #[test]
    fn exchange_returns_device_reply() {
        let (host, mut device) = MemoryTransport::pair();
        let responder = thread::spawn(move || {
            let mut assembler = FrameAssembler::new();
            loop {
                let chunk = device.read(64).unwrap();
                assembler.push(&chunk);
                if let Some(request) = assembler.next_packet() {
                    let reply = Packet::new(request.address(), CommandCode::State, vec![0x01])
                        .unwrap();
                    device.write_all(&encode(&reply)).unwrap();
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
        });

        let bus = Arc::new(Bus::with_config(
            host,
            ChannelConfig {
                response_timeout: Duration::from_secs(2),
                ..ChannelConfig::default()
            },
        ));
        let request = Packet::command(Address::new(9).unwrap(), CommandCode::State);
        let response = exchange(&bus, &request).unwrap();

        assert_eq!(response.command_code(), CommandCode::State);
        assert_eq!(response.data().as_ref(), &[0x01]);
        responder.join().unwrap();
    }

    #[test]
    fn exchange_times_out_on_silent_line() {
        let (host, _device) = MemoryTransport::pair();
        let bus = Arc::new(Bus::with_config(
            host,
            ChannelConfig {
                response_timeout: Duration::from_millis(20),
                ..ChannelConfig::default()
            },
        ));
        let request = Packet::command(Address::new(9).unwrap(), CommandCode::State);

        let err = exchange(&bus, &request).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(channel_error("send failed", err).code, crate::exit::TIMEOUT);
    }
}
