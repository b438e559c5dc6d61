#![no_main]
use libfuzzer_sys::fuzz_target;

use blocktar_core::{Header, BLOCK_SIZE};

fuzz_target!(|data: &[u8]| {
    if data.len() < BLOCK_SIZE {
        return;
    }
    let header = match Header::from_bytes(&data[..BLOCK_SIZE]) {
        Ok(header) => header,
        Err(_) => return,
    };

    for strict in [false, true] {
        if let Ok(entry) = header.decode(strict) {
            // Anything that decodes has to survive a trip through the encoder
            if let Ok(encoded) = Header::encode(&entry, false) {
                assert_eq!(encoded.decode(false).map(|e| e.path), Ok(entry.path));
            }
        }
    }
});
