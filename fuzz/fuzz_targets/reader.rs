#![no_main]
use std::io;

use libfuzzer_sys::fuzz_target;

use blocktar::ArchiveReader;

fuzz_target!(|data: &[u8]| {
    let mut reader = ArchiveReader::new(data, false);
    while let Ok(Some(found)) = reader.next_entry() {
        if reader.read_content(io::sink()).is_err() {
            break;
        }
        assert!(found.offset <= reader.position());
    }
});
