use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use ehl_channel::{Bus, ChannelConfig};
use ehl_frame::Packet;
use ehl_transport::Transport;
use tracing::info;

use crate::cmd::{open_bus, MonitorArgs};
use crate::exit::{channel_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let bus = open_bus(&args.serial, ChannelConfig::default().response_timeout)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(port = %args.serial.port, baud = args.serial.baud, "monitoring bus");
    let mut printed = 0usize;
    watch(&bus, &running, |packet| {
        if let Some(addresses) = &args.addresses {
            if !addresses.contains(&packet.address().get()) {
                return true;
            }
        }
        print_packet(packet, format);
        printed = printed.saturating_add(1);
        args.count.is_none_or(|count| printed < count)
    })
    .map_err(|err| channel_error("monitor failed", err))?;

    let stats = bus.stats();
    info!(
        frames = stats.frames,
        resync_bytes = stats.resync_bytes,
        checksum_errors = stats.checksum_errors,
        overflow_bytes = stats.overflow_bytes,
        "monitor stopped"
    );
    Ok(SUCCESS)
}

/// Poll the bus and hand each frame to `on_packet` until it returns false or
/// `running` is cleared.
fn watch<T, F>(bus: &Bus<T>, running: &AtomicBool, mut on_packet: F) -> ehl_channel::Result<()>
where
    T: Transport,
    F: FnMut(&Packet) -> bool,
{
    let idle = bus.config().poll_interval;
    while running.load(Ordering::SeqCst) {
        let packets = bus.poll()?;
        if packets.is_empty() {
            thread::sleep(idle);
            continue;
        }
        for packet in &packets {
            if !on_packet(packet) {
                return Ok(());
            }
        }
    }
    Ok(())
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
