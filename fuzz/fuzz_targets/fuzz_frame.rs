#![no_main]

use libfuzzer_sys::fuzz_target;
use picture_this_client::protocol::{parse_frame, Frame};
use picture_this_client::snapshot::Snapshot;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Classification must never panic, whatever the authority sends.
    let Ok(frames) = parse_frame(text) else {
        return;
    };

    // Neither must normalization of anything that looked like a snapshot.
    for frame in &frames {
        if let Frame::Snapshot(wire) = frame {
            let _ = Snapshot::from_wire(wire);
        }
    }
});
