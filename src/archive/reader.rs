use crate::archive::format::{EntryInfo, FieldReader, PackHeader, HEADER_SIZE};
use crate::compress::{decompress_into, zlib_header_seems_valid};
use crate::error::{PackError, Result};
use crate::obfuscate::{apply_keystream, derive_seed};
use crate::util::crc32;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, trace};

/// Upper bound on DEFLATE expansion (uncompressed bytes per stored byte)
const MAX_DEFLATE_RATIO: u64 = 1032;

/// Structural damage on an obfuscated entry reads as a wrong password
fn damaged(entry: &EntryInfo, err: PackError) -> PackError {
    if entry.is_obfuscated() {
        PackError::BadPassword
    } else {
        err
    }
}

fn checked_len(entry: &EntryInfo, size: u64) -> Result<usize> {
    usize::try_from(size)
        .map_err(|_| PackError::Format(format!("entry '{}' too large", entry.name)))
}

/// Read-only view of a finished pack
///
/// The directory is parsed once at [`PackReader::open`]; payloads are read from
/// disk on every extraction. A reader owns its file handle, so threads that
/// want to read concurrently each open their own reader.
pub struct PackReader {
    file: File,
    header: PackHeader,
    entries: Vec<EntryInfo>,
    xor_seed: u32,
}

impl PackReader {
    /// Open a pack, validating its header and parsing the directory
    ///
    /// `password` is only used when the pack declares obfuscated entries. A
    /// missing or empty password still opens the pack; extracting an
    /// obfuscated entry then fails with `BadPassword`.
    pub fn open<P: AsRef<Path>>(path: P, password: Option<&str>) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let file_len = file.metadata()?.len();

        if file_len < HEADER_SIZE as u64 {
            return Err(PackError::Format(format!(
                "file too short for header: {} bytes",
                file_len
            )));
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_bytes)?;
        let header = PackHeader::parse(&header_bytes)?;

        let xor_seed = match password.filter(|p| !p.is_empty()) {
            Some(password) if header.has_obfuscated_entries() => {
                derive_seed(Some(password), header.pack_salt)
            }
            _ => 0,
        };

        let entries = Self::read_directory(&mut file, &header, file_len)?;

        debug!(
            path = %path.as_ref().display(),
            entries = entries.len(),
            obfuscated = header.has_obfuscated_entries(),
            "pack opened"
        );

        Ok(Self {
            file,
            header,
            entries,
            xor_seed,
        })
    }

    /// Parse directory records until exactly `toc_size` bytes are consumed
    fn read_directory(
        file: &mut File,
        header: &PackHeader,
        file_len: u64,
    ) -> Result<Vec<EntryInfo>> {
        let toc_end = header
            .toc_offset
            .checked_add(header.toc_size)
            .filter(|&end| end <= file_len)
            .ok_or_else(|| {
                PackError::Format(format!(
                    "directory region {}+{} exceeds file length {}",
                    header.toc_offset, header.toc_size, file_len
                ))
            })?;
        let toc_len = usize::try_from(toc_end - header.toc_offset)
            .map_err(|_| PackError::Format("directory region too large".to_string()))?;

        let mut toc = Vec::new();
        toc.try_reserve_exact(toc_len)?;
        toc.resize(toc_len, 0);
        file.seek(SeekFrom::Start(header.toc_offset))?;
        file.read_exact(&mut toc)?;

        let mut fields = FieldReader::new(&toc);
        let mut entries = Vec::new();
        while !fields.is_empty() {
            entries.push(EntryInfo::read_from(&mut fields)?);
        }
        Ok(entries)
    }

    /// Validated header of this pack
    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    /// Whether the pack declares obfuscated entries
    pub fn has_obfuscated_entries(&self) -> bool {
        self.header.has_obfuscated_entries()
    }

    /// Number of entries in the directory
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// All directory entries in stored order
    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    /// Iterate over entry names in stored order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Index of the first entry named exactly `name`
    pub fn find(&self, name: &str) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| PackError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_ok()
    }

    /// Directory metadata for the entry at `index`
    pub fn stat(&self, index: usize) -> Result<&EntryInfo> {
        self.entries
            .get(index)
            .ok_or_else(|| PackError::NotFound(format!("entry index {}", index)))
    }

    /// Extract the entry at `index` into `dst`, returning the bytes written
    ///
    /// `dst` must hold at least `size_uncompressed` bytes for compressed entries
    /// and `size_stored` bytes otherwise, or the call fails with `NoSpace`
    /// without touching `dst`. Damage to an obfuscated entry is reported as
    /// `BadPassword`.
    pub fn extract_index(&mut self, index: usize, dst: &mut [u8]) -> Result<usize> {
        let entry = self.stat(index)?.clone();
        self.check_payload(&entry)?;

        let stored_len = checked_len(&entry, entry.size_stored)?;
        let mut stored = Vec::new();
        stored.try_reserve_exact(stored_len)?;
        stored.resize(stored_len, 0);
        self.file.seek(SeekFrom::Start(entry.offset))?;
        self.file.read_exact(&mut stored)?;

        if entry.is_obfuscated() {
            if self.xor_seed == 0 {
                return Err(PackError::BadPassword);
            }
            apply_keystream(self.xor_seed, &mut stored);
        }

        let produced = if entry.is_compressed() {
            let expected = checked_len(&entry, entry.size_uncompressed)?;
            if dst.len() < expected {
                return Err(PackError::NoSpace {
                    needed: entry.size_uncompressed,
                    available: dst.len() as u64,
                });
            }
            if !zlib_header_seems_valid(&stored) {
                return Err(damaged(
                    &entry,
                    PackError::Decompress(format!(
                        "entry '{}' does not start with a zlib header",
                        entry.name
                    )),
                ));
            }
            decompress_into(&stored, &mut dst[..expected]).map_err(|e| damaged(&entry, e))?
        } else {
            if dst.len() < stored.len() {
                return Err(PackError::NoSpace {
                    needed: entry.size_stored,
                    available: dst.len() as u64,
                });
            }
            dst[..stored.len()].copy_from_slice(&stored);
            stored.len()
        };

        let actual = crc32(&dst[..produced], 0);
        if actual != entry.crc32 {
            return Err(damaged(
                &entry,
                PackError::Format(format!(
                    "entry '{}' crc mismatch: stored {:08x}, computed {:08x}",
                    entry.name, entry.crc32, actual
                )),
            ));
        }

        trace!(
            name = %entry.name,
            stored = entry.size_stored,
            produced,
            flags = entry.flags,
            "extracted entry"
        );

        Ok(produced)
    }

    /// Extract the entry named `name` into `dst`
    pub fn extract(&mut self, name: &str, dst: &mut [u8]) -> Result<usize> {
        let index = self.find(name)?;
        self.extract_index(index, dst)
    }

    /// Extract the entry named `name` into a new buffer
    ///
    /// The buffer is sized from the directory record, which is checked
    /// against the file length first.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let index = self.find(name)?;
        let entry = self.entries[index].clone();
        self.check_payload(&entry)?;

        let claimed = if entry.is_compressed() {
            entry.size_uncompressed
        } else {
            entry.size_stored
        };
        let capacity = checked_len(&entry, claimed)?;

        let mut buffer = Vec::new();
        buffer.try_reserve_exact(capacity)?;
        buffer.resize(capacity, 0);

        let produced = self.extract_index(index, &mut buffer)?;
        buffer.truncate(produced);
        Ok(buffer)
    }

    /// Reject entries this reader cannot undo or whose sizes cannot be real
    fn check_payload(&self, entry: &EntryInfo) -> Result<()> {
        if entry.unknown_flags() != 0 {
            return Err(PackError::NotImplemented(format!(
                "entry '{}' uses unsupported flags {:#06x}",
                entry.name,
                entry.unknown_flags()
            )));
        }

        let file_len = self.file.metadata()?.len();
        if entry.offset > file_len || entry.size_stored > file_len - entry.offset {
            return Err(damaged(
                entry,
                PackError::Format(format!(
                    "entry '{}' payload {}+{} exceeds file length {}",
                    entry.name, entry.offset, entry.size_stored, file_len
                )),
            ));
        }

        if entry.is_compressed()
            && entry.size_uncompressed > entry.size_stored.saturating_mul(MAX_DEFLATE_RATIO)
        {
            return Err(damaged(
                entry,
                PackError::Format(format!(
                    "entry '{}' claims {} bytes from {} compressed",
                    entry.name, entry.size_uncompressed, entry.size_stored
                )),
            ));
        }

        Ok(())
    }

    /// Release the file handle and directory
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::writer::PackWriter;
    use crate::error::ErrorCode;
    use crate::options::BuildOptions;
    use tempfile::NamedTempFile;

    fn build_sample(path: &Path) {
        let options = BuildOptions::new().with_password("pw").with_alignment(8);
        let mut writer = PackWriter::begin(path, options).unwrap();
        writer.add("plain.txt", b"plain text", false, false).unwrap();
        writer
            .add("packed.txt", &b"repeat ".repeat(200), true, false)
            .unwrap();
        writer.add("hidden.bin", b"hidden bytes", false, true).unwrap();
        writer.add("empty", b"", false, false).unwrap();
        writer.end().unwrap();
    }

    #[test]
    fn test_open_and_lookup() {
        let temp_file = NamedTempFile::new().unwrap();
        build_sample(temp_file.path());

        let reader = PackReader::open(temp_file.path(), Some("pw")).unwrap();
        assert_eq!(reader.count(), 4);
        assert!(reader.has_obfuscated_entries());
        assert_eq!(
            reader.names().collect::<Vec<_>>(),
            vec!["plain.txt", "packed.txt", "hidden.bin", "empty"]
        );
        assert_eq!(reader.find("hidden.bin").unwrap(), 2);
        assert!(reader.contains("empty"));
        assert!(!reader.contains("Plain.txt"));

        let err = reader.find("missing").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        let err = reader.stat(4).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let packed = reader.stat(1).unwrap();
        assert!(packed.is_compressed());
        assert_eq!(packed.size_uncompressed, 1400);
        assert_eq!(packed.offset % 8, 0);
    }

    #[test]
    fn test_extract_all_kinds() {
        let temp_file = NamedTempFile::new().unwrap();
        build_sample(temp_file.path());

        let mut reader = PackReader::open(temp_file.path(), Some("pw")).unwrap();
        assert_eq!(reader.read_entry("plain.txt").unwrap(), b"plain text");
        assert_eq!(reader.read_entry("packed.txt").unwrap(), b"repeat ".repeat(200));
        assert_eq!(reader.read_entry("hidden.bin").unwrap(), b"hidden bytes");
        assert!(reader.read_entry("empty").unwrap().is_empty());

        let mut dst = [0u8; 16];
        let written = reader.extract("plain.txt", &mut dst).unwrap();
        assert_eq!(&dst[..written], b"plain text");
    }

    #[test]
    fn test_missing_password_is_bad_password() {
        let temp_file = NamedTempFile::new().unwrap();
        build_sample(temp_file.path());

        let mut reader = PackReader::open(temp_file.path(), None).unwrap();
        let err = reader.read_entry("hidden.bin").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadPassword);

        // plain entries stay readable
        assert_eq!(reader.read_entry("plain.txt").unwrap(), b"plain text");

        let mut reader = PackReader::open(temp_file.path(), Some("")).unwrap();
        let err = reader.read_entry("hidden.bin").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadPassword);
    }

    #[test]
    fn test_nospace_leaves_destination_untouched() {
        let temp_file = NamedTempFile::new().unwrap();
        build_sample(temp_file.path());

        let mut reader = PackReader::open(temp_file.path(), Some("pw")).unwrap();

        let mut dst = [0xEEu8; 4];
        let err = reader.extract("plain.txt", &mut dst).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoSpace);
        assert_eq!(dst, [0xEE; 4]);

        let mut dst = vec![0xEEu8; 1399];
        let err = reader.extract("packed.txt", &mut dst).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoSpace);
        assert!(dst.iter().all(|&b| b == 0xEE));
    }

    #[test]
    fn test_unknown_flag_not_implemented() {
        let temp_file = NamedTempFile::new().unwrap();
        build_sample(temp_file.path());

        let mut reader = PackReader::open(temp_file.path(), Some("pw")).unwrap();
        reader.entries[0].flags |= 0x80;
        let mut dst = [0u8; 32];
        let err = reader.extract_index(0, &mut dst).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotImplemented);
    }

    #[test]
    fn test_implausible_size_claims_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        build_sample(temp_file.path());

        let mut reader = PackReader::open(temp_file.path(), Some("pw")).unwrap();

        // compressed entry claiming more than deflate can produce
        reader.entries[1].size_uncompressed = u64::MAX / 2;
        let err = reader.read_entry("packed.txt").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Format);

        // same claim on an obfuscated entry
        reader.entries[2].flags |= crate::archive::format::ENTRY_COMPRESSED;
        reader.entries[2].size_uncompressed = u64::MAX / 2;
        let err = reader.read_entry("hidden.bin").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadPassword);

        // raw entry reaching past the end of the file
        reader.entries[0].size_stored = 1 << 40;
        let err = reader.read_entry("plain.txt").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Format);
    }

    #[test]
    fn test_open_rejects_short_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), b"LEOPACK\0").unwrap();
        let err = PackReader::open(temp_file.path(), None).err().unwrap();
        assert_eq!(err.code(), ErrorCode::Format);
    }

    #[test]
    fn test_open_missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = PackReader::open(dir.path().join("nope.pack"), None)
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::Io);
    }
}
