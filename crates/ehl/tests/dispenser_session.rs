#![cfg(all(feature = "channel", feature = "transaction"))]

mod support;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ehl::channel::{Bus, ChannelConfig, ChannelError, CommandChannel};
use ehl::frame::{Address, CommandCode};
use ehl::transaction::{PaymentType, Transaction, TransactionManager, TransactionState};
use ehl::transport::MemoryTransport;

use support::{be_u32, Emulator, LineNoise, DELIVERING, DONE, FLOW_STEP_ML, IDLE, PROGRAMMED};

fn addr(raw: u8) -> Address {
    Address::new(raw).expect("address in range")
}

fn test_bus() -> (Arc<Bus<MemoryTransport>>, MemoryTransport) {
    let (host, device) = MemoryTransport::pair();
    let bus = Arc::new(Bus::with_config(
        host,
        ChannelConfig {
            response_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(1),
            ..ChannelConfig::default()
        },
    ));
    (bus, device)
}

fn status(pump: &CommandChannel<MemoryTransport>) -> u8 {
    let response = pump.query(CommandCode::State).expect("state query");
    assert_eq!(response.command_code(), CommandCode::State);
    response.data()[0]
}

fn read_u32(pump: &CommandChannel<MemoryTransport>, command: CommandCode) -> u32 {
    let response = pump.query(command).expect("reading");
    assert_eq!(response.command_code(), command);
    be_u32(response.data()).expect("four byte reading")
}

#[test]
fn full_delivery_is_accounted() {
    let (bus, device) = test_bus();
    let _emulator = Emulator::spawn(device, &[1]);
    let pump = bus.channel(addr(1));
    let mut manager = TransactionManager::new();

    let preset_ml = 10_000u32;
    let price_per_litre = 2_490u32;

    let tx = manager.start_transaction(1).expect("start");
    assert_eq!(tx.state(), TransactionState::Ready);
    tx.payment_type = PaymentType::BankCard;
    tx.preset_amount = u64::from(preset_ml) * u64::from(price_per_litre) / 1_000;
    tx.unit_price = u64::from(price_per_litre);

    let ack = pump
        .request(CommandCode::ProgPrc, price_per_litre.to_be_bytes().to_vec())
        .expect("program price");
    assert_eq!(ack.command_code(), CommandCode::Ok);
    let ack = pump
        .request(CommandCode::ProgW, preset_ml.to_be_bytes().to_vec())
        .expect("program preset");
    assert_eq!(ack.command_code(), CommandCode::Ok);
    assert_eq!(status(&pump), PROGRAMMED);

    assert_eq!(
        pump.query(CommandCode::Unblock).expect("unblock").command_code(),
        CommandCode::Ok
    );
    assert_eq!(status(&pump), DELIVERING);
    manager.transition(1, TransactionState::Active).expect("activate");

    let mut polls = 0;
    let mut volume = 0;
    while status(&pump) != DONE {
        volume = read_u32(&pump, CommandCode::Volume);
        polls += 1;
        assert!(polls <= 10, "delivery never completed");
    }
    assert_eq!(volume, preset_ml);
    assert_eq!(polls, preset_ml.div_ceil(FLOW_STEP_ML));

    let amount = read_u32(&pump, CommandCode::Price);
    manager.transition(1, TransactionState::Finished).expect("finish");
    {
        let tx = manager.get_transaction_mut(1).expect("active transaction");
        tx.delivered_volume = u64::from(volume);
        tx.delivered_amount = u64::from(amount);
        assert!(tx.end_time().is_some());
    }
    manager.transition(1, TransactionState::Accounted).expect("account");

    let done = manager.finalize_transaction(1).expect("finalized record");
    assert!(done.is_terminal());
    assert_eq!(done.delivered_volume, 10_000);
    assert_eq!(done.delivered_amount, done.preset_amount);
    assert!(manager.is_empty());
    assert_eq!(bus.stats().resync_bytes, 0);
}

#[test]
fn noisy_line_keeps_responses_in_order() {
    let (bus, device) = test_bus();
    let _emulator = Emulator::spawn_noisy(
        device,
        &[4],
        LineNoise {
            garbage: vec![0x00, 0x20, 0x03, 0x36, 0xFF],
            dribble: Some(Duration::from_micros(200)),
        },
    );
    let pump = bus.channel(addr(4));

    for _ in 0..5 {
        let response = pump.query(CommandCode::LineTest).expect("line test");
        assert_eq!(response.address(), addr(4));
        assert_eq!(response.command_code(), CommandCode::Ok);
    }
    assert_eq!(status(&pump), IDLE);

    let stats = bus.stats();
    assert_eq!(stats.frames, 6);
    assert!(stats.resync_bytes >= 6 * 5);
}

#[test]
fn dispensers_on_one_bus_do_not_steal_replies() {
    let (bus, device) = test_bus();
    let _emulator = Emulator::spawn(device, &[1, 2, 3]);

    let workers: Vec<_> = (1..=3u8)
        .map(|raw| {
            let pump = bus.channel(addr(raw));
            thread::spawn(move || {
                let preset = 5_000 * u32::from(raw);
                pump.request(CommandCode::ProgW, preset.to_be_bytes().to_vec())
                    .expect("program preset");
                pump.query(CommandCode::Unblock).expect("unblock");
                for _ in 0..20 {
                    let response = pump.query(CommandCode::Volume).expect("volume");
                    assert_eq!(response.address(), pump.address());
                    if be_u32(response.data()) == Some(preset) {
                        return preset;
                    }
                }
                panic!("dispenser {raw} never reached its preset");
            })
        })
        .collect();

    let presets: Vec<u32> = workers
        .into_iter()
        .map(|worker| worker.join().expect("worker"))
        .collect();
    assert_eq!(presets, vec![5_000, 10_000, 15_000]);
    assert_eq!(bus.queued(), 0);
    assert_eq!(bus.addresses(), vec![addr(1), addr(2), addr(3)]);
}

#[test]
fn silent_dispenser_times_out_without_poisoning_the_bus() {
    let (bus, device) = test_bus();
    let _emulator = Emulator::spawn(device, &[1]);

    let missing = bus.channel(addr(9));
    let err = missing
        .send_and_await(
            &ehl::frame::Packet::command(addr(9), CommandCode::State),
            Duration::from_millis(30),
        )
        .expect_err("nobody answers address 9");
    assert!(matches!(err, ChannelError::Timeout(_)));

    let pump = bus.channel(addr(1));
    assert_eq!(status(&pump), IDLE);
}

#[test]
fn annulled_transaction_is_terminal() {
    let (bus, device) = test_bus();
    let _emulator = Emulator::spawn(device, &[2]);
    let pump = bus.channel(addr(2));
    let mut manager = TransactionManager::new();

    manager.start_transaction(2).expect("start");
    pump.request(CommandCode::ProgW, 20_000u32.to_be_bytes().to_vec())
        .expect("program preset");

    // Customer walks away before lifting the nozzle.
    assert_eq!(
        pump.query(CommandCode::Block).expect("block").command_code(),
        CommandCode::Ok
    );
    manager
        .transition(2, TransactionState::Annulated)
        .expect("annul");

    for target in TransactionState::ALL {
        assert!(manager.transition(2, target).is_err());
    }
    let record = manager.finalize_transaction(2).expect("record");
    assert_eq!(record.state(), TransactionState::Annulated);
    assert!(record.end_time().is_none());
    assert_eq!(status(&pump), IDLE);
}

#[test]
fn interrupted_delivery_is_restored_after_power_loss() {
    let mut before = TransactionManager::new();
    before.start_transaction(3).expect("start");
    before
        .transition(3, TransactionState::Active)
        .expect("activate");
    before.get_transaction_mut(3).expect("active").delivered_volume = 7_400;

    // The record as a persistence layer would have saved it when power dropped.
    let saved = before.finalize_transaction(3).expect("record");
    let stored = serde_json::to_string(&saved).expect("serialize");
    let reloaded: Transaction = serde_json::from_str(&stored).expect("deserialize");
    assert_eq!(reloaded.state(), TransactionState::Active);

    let mut after = TransactionManager::new();
    assert!(after
        .restore_after_power_loss(reloaded)
        .expect("recoverable")
        .is_none());
    let tx = after.get_transaction(3).expect("restored");
    assert_eq!(tx.state(), TransactionState::FinancialTechReturn);
    assert_eq!(tx.delivered_volume, 7_400);
    assert_eq!(tx.id(), saved.id());

    after
        .transition(3, TransactionState::Accounted)
        .expect("account");
    let next = after.start_transaction(4).expect("next").id();
    assert!(next > saved.id());
}
