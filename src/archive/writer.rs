use crate::archive::format::{
    EntryInfo, PackHeader, ENTRY_COMPRESSED, ENTRY_OBFUSCATED, HEADER_SIZE, MAX_NAME_LENGTH,
    PACK_FLAG_OBFUSCATED,
};
use crate::compress;
use crate::error::{PackError, Result};
use crate::obfuscate::{apply_keystream, derive_seed};
use crate::options::BuildOptions;
use crate::util::{align_up, crc32};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, trace};

/// Zero bytes used for alignment padding
const PADDING: [u8; 16] = [0u8; 16];

/// Normalize a logical name: forward slashes, no leading "./"
fn normalize_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    match name.strip_prefix("./") {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

/// Sequential pack builder
///
/// Payloads are written as they are added; the directory and the final header
/// are written by [`PackWriter::end`]. If the session is dropped or fails
/// midway, whatever was already written stays on disk as an unusable file.
pub struct PackWriter {
    writer: BufWriter<File>,
    options: BuildOptions,
    entries: Vec<EntryInfo>,
    names: HashSet<String>,
    data_offset: u64,
    data_cursor: u64,
    pack_salt: u64,
    xor_seed: u32,
    any_obfuscation: bool,
}

impl PackWriter {
    /// Create a pack with default options (no password, level 6, unaligned)
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::begin(path, BuildOptions::default())
    }

    /// Start a build session writing to `path`
    ///
    /// Truncates any existing file and reserves a zero-filled header.
    pub fn begin<P: AsRef<Path>>(path: P, options: BuildOptions) -> Result<Self> {
        options.validate()?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        let mut writer = BufWriter::new(file);

        // Placeholder header (rewritten by end())
        writer.write_all(&[0u8; HEADER_SIZE])?;

        let pack_salt: u64 = rand::random();
        let xor_seed = match options.effective_password() {
            Some(password) => derive_seed(Some(password), pack_salt),
            None => 0,
        };

        debug!(
            path = %path.as_ref().display(),
            level = options.level,
            alignment = options.effective_alignment(),
            keyed = xor_seed != 0,
            "pack build session started"
        );

        Ok(Self {
            writer,
            options,
            entries: Vec::new(),
            names: HashSet::new(),
            data_offset: HEADER_SIZE as u64,
            data_cursor: HEADER_SIZE as u64,
            pack_salt,
            xor_seed,
            any_obfuscation: false,
        })
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Add a named payload
    ///
    /// `compress` is opportunistic: the entry is stored raw unless the zlib
    /// stream is strictly smaller. `obfuscate` requires a configured password.
    pub fn add(&mut self, name: &str, data: &[u8], compress: bool, obfuscate: bool) -> Result<()> {
        if obfuscate && self.xor_seed == 0 {
            return Err(PackError::InvalidArg(format!(
                "obfuscation requested for '{}' but no password is configured",
                name
            )));
        }

        let name = normalize_name(name);
        if name.len() > MAX_NAME_LENGTH {
            return Err(PackError::InvalidArg(format!(
                "entry name too long: {} bytes (max {})",
                name.len(),
                MAX_NAME_LENGTH
            )));
        }
        if self.names.contains(&name) {
            return Err(PackError::State(format!("duplicate entry name: {}", name)));
        }

        let mut flags = 0u16;
        if obfuscate {
            flags |= ENTRY_OBFUSCATED;
            self.any_obfuscation = true;
        }

        // Zero-length entries have no payload bytes at all
        if data.is_empty() {
            trace!(name = %name, "added empty entry");
            self.push_entry(EntryInfo {
                name,
                flags,
                offset: self.data_cursor,
                size_uncompressed: 0,
                size_stored: 0,
                crc32: 0,
            });
            return Ok(());
        }

        let mut payload = Cow::Borrowed(data);
        if compress {
            match compress::compress(data, self.options.level) {
                Ok(compressed) if compressed.len() < data.len() => {
                    flags |= ENTRY_COMPRESSED;
                    payload = Cow::Owned(compressed);
                }
                Ok(compressed) => {
                    debug!(
                        name = %name,
                        original = data.len(),
                        compressed = compressed.len(),
                        "compression not beneficial, storing raw"
                    );
                }
                Err(e) => {
                    debug!(name = %name, error = %e, "compression failed, storing raw");
                }
            }
        }

        // Obfuscate a private copy, never the caller's bytes
        if obfuscate {
            apply_keystream(self.xor_seed, payload.to_mut());
        }

        self.pad_to_alignment()?;

        let offset = self.data_cursor;
        self.writer.write_all(&payload)?;
        self.data_cursor += payload.len() as u64;

        trace!(
            name = %name,
            offset,
            size = data.len(),
            stored = payload.len(),
            flags,
            "added entry"
        );

        self.push_entry(EntryInfo {
            name,
            flags,
            offset,
            size_uncompressed: data.len() as u64,
            size_stored: payload.len() as u64,
            crc32: crc32(data, 0),
        });

        Ok(())
    }

    /// Add a file from disk under the logical name `name`
    pub fn add_file_from_disk(
        &mut self,
        name: &str,
        disk_path: &Path,
        compress: bool,
        obfuscate: bool,
    ) -> Result<()> {
        let data = std::fs::read(disk_path)?;
        self.add(name, &data, compress, obfuscate)
    }

    /// Finish the pack: write the directory, then rewrite the header
    pub fn end(mut self) -> Result<()> {
        let toc_offset = self.data_cursor;

        let mut toc_size = 0u64;
        for entry in &self.entries {
            toc_size += entry.write_to(&mut self.writer)? as u64;
        }

        self.writer.flush()?;
        let mut file = self.writer.into_inner().map_err(|e| e.into_error())?;

        let mut header = PackHeader::new();
        if self.any_obfuscation {
            header.pack_flags |= PACK_FLAG_OBFUSCATED;
        }
        header.toc_offset = toc_offset;
        header.toc_size = toc_size;
        header.data_offset = self.data_offset;
        header.pack_salt = self.pack_salt;
        header.seal();

        file.seek(SeekFrom::Start(0))?;
        header.write_to(&mut file)?;
        file.flush()?;

        debug!(
            entries = self.entries.len(),
            toc_offset,
            toc_size,
            "pack finalized"
        );

        Ok(())
    }

    fn push_entry(&mut self, entry: EntryInfo) {
        self.names.insert(entry.name.clone());
        self.entries.push(entry);
    }

    /// Zero-pad the write cursor up to the configured alignment
    fn pad_to_alignment(&mut self) -> Result<()> {
        let aligned = align_up(self.data_cursor, self.options.effective_alignment());
        let mut pad = aligned - self.data_cursor;
        while pad > 0 {
            let chunk = pad.min(PADDING.len() as u64) as usize;
            self.writer.write_all(&PADDING[..chunk])?;
            pad -= chunk as u64;
        }
        self.data_cursor = aligned;
        Ok(())
    }
}
