//! leopack: single-file asset pack container
//!
//! A pack is one file holding many named payloads, laid out as:
//! - A fixed 88-byte header (magic, version, flags, directory location, salt, CRC)
//! - Payload data, each entry optionally zlib-compressed and XOR-obfuscated
//! - A directory of length-prefixed names and fixed-size records
//!
//! Packs are built once, sequentially, by [`PackWriter`] and read randomly by
//! [`PackReader`]. Every extraction re-verifies the CRC32 of the original bytes.
//!
//! # Example
//!
//! ```no_run
//! use leopack::{BuildOptions, PackReader, PackWriter};
//!
//! // Build a pack
//! let options = BuildOptions::new().with_password("hunter2").with_alignment(16);
//! let mut writer = PackWriter::begin("assets.pack", options)?;
//! writer.add("maps/level1.json", b"{\"tiles\": []}", true, false)?;
//! writer.add("scripts/boss.lua", b"return {}", true, true)?;
//! writer.end()?;
//!
//! // Read it back
//! let mut reader = PackReader::open("assets.pack", Some("hunter2"))?;
//! let script = reader.read_entry("scripts/boss.lua")?;
//! assert_eq!(script, b"return {}");
//! # Ok::<(), leopack::PackError>(())
//! ```

// Core modules
pub mod archive;
pub mod compress;
pub mod error;
pub mod obfuscate;
pub mod options;
pub mod util;

// Re-export commonly used types
pub use archive::{
    EntryInfo, PackHeader, PackReader, PackWriter, ENTRY_COMPRESSED, ENTRY_OBFUSCATED,
    FORMAT_VERSION, HEADER_SIZE, MAGIC, MAX_NAME_LENGTH, PACK_FLAG_OBFUSCATED,
};
pub use error::{ErrorCode, PackError, Result};
pub use options::BuildOptions;
