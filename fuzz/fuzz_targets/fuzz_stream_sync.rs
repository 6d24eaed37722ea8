#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use voltage_sniffer::{AccumulationBuffer, FrameSynchronizer, DeviceStore, FRAME_LEN, MAX_BATTERIES};

#[derive(Debug, Arbitrary)]
struct Input {
    capacity: u16,
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: Input| {
    let capacity = usize::from(input.capacity).max(1);
    let mut buffer = AccumulationBuffer::new(capacity);
    let mut sync = FrameSynchronizer::new();
    let mut store = DeviceStore::new();
    let now = chrono::Utc::now();

    for chunk in &input.chunks {
        let evicted = buffer.append(chunk);
        sync.record_eviction(evicted);
        assert!(buffer.len() <= capacity);

        sync.scan(&mut buffer, |frame| {
            let reading = voltage_sniffer::decode_frame(frame, now)?;
            store.upsert(reading);
            Ok(())
        });
        assert!(buffer.len() < FRAME_LEN);
    }

    assert!(store.iter().all(|r| (1..=MAX_BATTERIES).contains(&r.slave_id)));
});
