#![no_main]

use leopack::{PackReader, HEADER_SIZE};
use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::NamedTempFile;

/// Password used by the seed corpus
const SEED_PASSWORD: &str = "fuzz";

fn exercise(path: &std::path::Path, password: Option<&str>) {
    // Open must reject garbage with an error, never a panic
    let mut reader = match PackReader::open(path, password) {
        Ok(r) => r,
        Err(_) => return,
    };

    let names: Vec<String> = reader.names().map(str::to_string).collect();
    for name in &names {
        let _ = reader.find(name);
        let _ = reader.read_entry(name);
    }

    // Undersized and empty destinations
    let mut small = [0u8; 16];
    for index in 0..reader.count() {
        let _ = reader.stat(index);
        let _ = reader.extract_index(index, &mut small);
        let _ = reader.extract_index(index, &mut []);
    }

    let _ = reader.stat(reader.count());
    let _ = reader.contains("");
    let _ = reader.contains("../../../etc/passwd");
}

fuzz_target!(|data: &[u8]| {
    // Anything shorter than a header is rejected before parsing
    if data.len() < HEADER_SIZE {
        return;
    }

    let mut temp_file = match NamedTempFile::new() {
        Ok(f) => f,
        Err(_) => return,
    };
    if temp_file.write_all(data).is_err() || temp_file.flush().is_err() {
        return;
    }

    exercise(temp_file.path(), None);
    exercise(temp_file.path(), Some(SEED_PASSWORD));
    exercise(temp_file.path(), Some("wrong"));
});
