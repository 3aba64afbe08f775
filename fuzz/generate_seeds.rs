//! Generate seed corpus for fuzzing

use leopack::{BuildOptions, PackWriter};
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let corpus_dir = "fuzz/corpus/fuzz_pack_parse";
    fs::create_dir_all(corpus_dir)?;

    println!("Generating seed corpus...");

    // Seed 1: Empty pack (no entries)
    {
        let path = format!("{}/seed_empty.pack", corpus_dir);
        let writer = PackWriter::create(&path)?;
        writer.end()?;
        println!("✓ Generated: {}", path);
    }

    // Seed 2: Single raw entry
    {
        let path = format!("{}/seed_single_small.pack", corpus_dir);
        let mut writer = PackWriter::create(&path)?;
        writer.add("test.txt", b"Hello, World!", false, false)?;
        writer.end()?;
        println!("✓ Generated: {}", path);
    }

    // Seed 3: Several entries, aligned
    {
        let path = format!("{}/seed_multi_aligned.pack", corpus_dir);
        let options = BuildOptions::new().with_alignment(16);
        let mut writer = PackWriter::begin(&path, options)?;
        writer.add("file1.txt", b"First file", false, false)?;
        writer.add("file2.txt", b"Second file", false, false)?;
        writer.add("dir/file3.txt", b"Third file in directory", false, false)?;
        writer.end()?;
        println!("✓ Generated: {}", path);
    }

    // Seed 4: Compressed entry
    {
        let path = format!("{}/seed_compressed.pack", corpus_dir);
        let mut writer = PackWriter::create(&path)?;
        let large_data = b"This is test data for compression. ".repeat(1000);
        writer.add("large.txt", &large_data, true, false)?;
        writer.end()?;
        println!("✓ Generated: {}", path);
    }

    // Seed 5: Obfuscated and compressed+obfuscated entries
    {
        let path = format!("{}/seed_obfuscated.pack", corpus_dir);
        let options = BuildOptions::new().with_password("fuzz");
        let mut writer = PackWriter::begin(&path, options)?;
        let binary_data: Vec<u8> = (0..255).collect();
        writer.add("binary.bin", &binary_data, false, true)?;
        writer.add("script.lua", &b"print('hi')\n".repeat(64), true, true)?;
        writer.end()?;
        println!("✓ Generated: {}", path);
    }

    // Seed 6: Zero-length entry
    {
        let path = format!("{}/seed_zero_length.pack", corpus_dir);
        let mut writer = PackWriter::create(&path)?;
        writer.add("empty.txt", b"", false, false)?;
        writer.end()?;
        println!("✓ Generated: {}", path);
    }

    println!("\nGenerated 6 seed files in {}", corpus_dir);
    Ok(())
}
