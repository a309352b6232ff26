//! Software dispenser emulator driven over the far end of a memory pipe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ehl::frame::{encode, Address, CommandCode, FrameAssembler, Packet};
use ehl::transport::{MemoryTransport, Transport};

/// Pump status byte returned for `STATE`.
pub const IDLE: u8 = 0;
pub const PROGRAMMED: u8 = 1;
pub const DELIVERING: u8 = 2;
pub const DONE: u8 = 3;

/// Volume added on each `VOLUME` poll while delivering, in millilitres.
pub const FLOW_STEP_ML: u32 = 2_500;

#[derive(Debug, Default, Clone)]
struct Pump {
    status: u8,
    price: u32,
    preset_ml: u32,
    delivered_ml: u32,
}

impl Pump {
    fn handle(&mut self, request: &Packet) -> Packet {
        let address = request.address();
        let ok = Packet::command(address, CommandCode::Ok);
        match request.command_code() {
            CommandCode::State => reply(address, CommandCode::State, vec![self.status]),
            CommandCode::ProgPrc => match be_u32(request.data()) {
                Some(price) => {
                    self.price = price;
                    ok
                }
                None => Packet::command(address, CommandCode::Error),
            },
            CommandCode::ProgW => match be_u32(request.data()) {
                Some(preset) if self.status == IDLE => {
                    self.preset_ml = preset;
                    self.delivered_ml = 0;
                    self.status = PROGRAMMED;
                    ok
                }
                _ => Packet::command(address, CommandCode::Error),
            },
            CommandCode::Unblock if self.status == PROGRAMMED => {
                self.status = DELIVERING;
                ok
            }
            CommandCode::Volume => {
                if self.status == DELIVERING {
                    self.delivered_ml = (self.delivered_ml + FLOW_STEP_ML).min(self.preset_ml);
                    if self.delivered_ml == self.preset_ml {
                        self.status = DONE;
                    }
                }
                reply(address, CommandCode::Volume, self.delivered_ml.to_be_bytes().to_vec())
            }
            CommandCode::Price => {
                let amount = u64::from(self.delivered_ml) * u64::from(self.price) / 1_000;
                let amount = u32::try_from(amount).unwrap_or(u32::MAX);
                reply(address, CommandCode::Price, amount.to_be_bytes().to_vec())
            }
            CommandCode::Stop if self.status == DELIVERING => {
                self.status = DONE;
                ok
            }
            CommandCode::Block | CommandCode::Zer => {
                *self = Pump {
                    price: self.price,
                    ..Pump::default()
                };
                ok
            }
            CommandCode::LineTest => ok,
            _ => Packet::command(address, CommandCode::Error),
        }
    }
}

fn reply(address: Address, command: CommandCode, data: Vec<u8>) -> Packet {
    Packet::new(address, command, data).expect("emulator replies fit in one frame")
}

pub fn be_u32(data: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = data.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Line impairments applied to every reply.
#[derive(Debug, Clone, Default)]
pub struct LineNoise {
    /// Bytes written before each reply.
    pub garbage: Vec<u8>,
    /// Write replies one byte at a time with this gap.
    pub dribble: Option<Duration>,
}

/// Emulates a set of dispensers listening on one bus.
///
/// Requests to addresses it does not emulate go unanswered.
pub struct Emulator {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Emulator {
    pub fn spawn(device: MemoryTransport, addresses: &[u8]) -> Self {
        Self::spawn_noisy(device, addresses, LineNoise::default())
    }

    pub fn spawn_noisy(mut device: MemoryTransport, addresses: &[u8], noise: LineNoise) -> Self {
        let mut pumps: HashMap<u8, Pump> = addresses
            .iter()
            .map(|&address| (address, Pump::default()))
            .collect();
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut assembler = FrameAssembler::new();
                while !stop.load(Ordering::SeqCst) {
                    let chunk = match device.read(128) {
                        Ok(chunk) => chunk,
                        Err(_) => return,
                    };
                    if chunk.is_empty() {
                        thread::sleep(Duration::from_millis(1));
                        continue;
                    }
                    assembler.push(&chunk);
                    for request in assembler.drain() {
                        let Some(pump) = pumps.get_mut(&request.address().get()) else {
                            continue;
                        };
                        let response = pump.handle(&request);
                        if send(&mut device, &noise, &response).is_err() {
                            return;
                        }
                    }
                }
            })
        };

        Self {
            stop,
            handle: Some(handle),
        }
    }
}

fn send(
    device: &mut MemoryTransport,
    noise: &LineNoise,
    response: &Packet,
) -> ehl::transport::Result<()> {
    if !noise.garbage.is_empty() {
        device.write_all(&noise.garbage)?;
    }
    let wire = encode(response);
    match noise.dribble {
        Some(gap) => {
            for byte in wire.iter() {
                device.write_all(&[*byte])?;
                thread::sleep(gap);
            }
            Ok(())
        }
        None => device.write_all(&wire),
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
