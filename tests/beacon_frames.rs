//! Beacon burst framing over an in-memory sink.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use nhacpdiag::beacon::Beacon;
use nhacpdiag::config::BeaconConfig;
use nhacpdiag::protocol::{
    self, Frame, DATA_BUFFER_FRAME_LEN, GET_BLOCK_FRAME_LEN,
};

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn fast_config() -> BeaconConfig {
    BeaconConfig {
        burst_gap_ms: 0,
        interval_ms: 0,
    }
}

#[tokio::test]
async fn burst_emits_one_data_buffer_and_one_request() {
    let sink = SharedSink::default();
    let mut beacon = Beacon::new(sink.clone(), &fast_config());

    beacon.burst().await.expect("burst");
    assert_eq!(beacon.bursts_sent(), 1);

    let wire = sink.0.lock().unwrap();
    assert_eq!(wire.len(), DATA_BUFFER_FRAME_LEN + GET_BLOCK_FRAME_LEN);

    match protocol::decode(&wire[..DATA_BUFFER_FRAME_LEN]).expect("first frame") {
        Frame::DataBuffer(msg) => {
            assert_eq!(msg.len, 128);
            assert_eq!(msg.data[0], 0);
            // Filler that needs no escaping.
            assert!(msg.data[1..].iter().all(|&b| b == b'z'));
        }
        other => panic!("unexpected first frame: {:?}", other),
    }

    match protocol::decode(&wire[DATA_BUFFER_FRAME_LEN..]).expect("second frame") {
        Frame::GetBlock(req) => {
            assert_eq!(req.index, 0);
            assert_eq!(req.block, 0);
            assert_eq!(req.len, 128);
        }
        other => panic!("unexpected second frame: {:?}", other),
    }
}

#[tokio::test]
async fn successive_bursts_advance_counter_and_block() {
    let sink = SharedSink::default();
    let mut beacon = Beacon::new(sink.clone(), &fast_config());

    beacon.burst().await.expect("burst");
    beacon.burst().await.expect("burst");
    assert_eq!(beacon.bursts_sent(), 2);

    let wire = sink.0.lock().unwrap();
    let burst_len = DATA_BUFFER_FRAME_LEN + GET_BLOCK_FRAME_LEN;
    assert_eq!(wire.len(), 2 * burst_len);

    let second = &wire[burst_len..];
    match protocol::decode(&second[..DATA_BUFFER_FRAME_LEN]).expect("data frame") {
        Frame::DataBuffer(msg) => assert_eq!(msg.data[0], 1),
        other => panic!("unexpected frame: {:?}", other),
    }
    match protocol::decode(&second[DATA_BUFFER_FRAME_LEN..]).expect("request frame") {
        Frame::GetBlock(req) => assert_eq!(req.block, 1),
        other => panic!("unexpected frame: {:?}", other),
    }
}
