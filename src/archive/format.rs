use crate::error::{PackError, Result};
use crate::util::crc32;
use std::io::Write;

/// Magic signature at offset 0
pub const MAGIC: [u8; 8] = *b"LEOPACK\0";

/// Current (and only) format version
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes, including 4 trailing padding bytes
pub const HEADER_SIZE: usize = 88;

/// Offset of `header_crc32` inside the header
pub const HEADER_CRC_OFFSET: usize = 80;

/// Fixed directory record size in bytes (follows the length-prefixed name)
pub const ENTRY_RECORD_SIZE: usize = 40;

/// Maximum entry name length in bytes (UTF-8)
pub const MAX_NAME_LENGTH: usize = u16::MAX as usize;

/// Pack flag: at least one entry is obfuscated
pub const PACK_FLAG_OBFUSCATED: u32 = 1 << 0;

/// Entry flag: payload is a zlib stream
pub const ENTRY_COMPRESSED: u16 = 1 << 0;

/// Entry flag: payload is XORed with the pack keystream
pub const ENTRY_OBFUSCATED: u16 = 1 << 1;

/// Every entry flag this version knows how to undo
pub const KNOWN_ENTRY_FLAGS: u16 = ENTRY_COMPRESSED | ENTRY_OBFUSCATED;

/// Pack header at the beginning of the file
///
/// Layout (88 bytes, little-endian):
/// - Magic: 8 bytes
/// - Version: u32
/// - Pack flags: u32
/// - TOC offset: u64
/// - TOC size: u64
/// - Data offset: u64
/// - Pack salt: u64
/// - Reserved: 8 x u32
/// - Header CRC32: u32 (over all 88 bytes with this field zeroed)
/// - Padding: 4 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackHeader {
    pub version: u32,
    pub pack_flags: u32,
    pub toc_offset: u64,
    pub toc_size: u64,
    pub data_offset: u64,
    pub pack_salt: u64,
    pub reserved: [u32; 8],
    pub header_crc32: u32,
}

impl PackHeader {
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            pack_flags: 0,
            toc_offset: 0,
            toc_size: 0,
            data_offset: 0,
            pack_salt: 0,
            reserved: [0; 8],
            header_crc32: 0,
        }
    }

    /// Whether the pack declares obfuscated entries
    pub fn has_obfuscated_entries(&self) -> bool {
        self.pack_flags & PACK_FLAG_OBFUSCATED != 0
    }

    /// Serialize the header exactly as it is stored on disk
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&MAGIC);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.pack_flags.to_le_bytes());
        buf[16..24].copy_from_slice(&self.toc_offset.to_le_bytes());
        buf[24..32].copy_from_slice(&self.toc_size.to_le_bytes());
        buf[32..40].copy_from_slice(&self.data_offset.to_le_bytes());
        buf[40..48].copy_from_slice(&self.pack_salt.to_le_bytes());
        for (i, word) in self.reserved.iter().enumerate() {
            let start = 48 + i * 4;
            buf[start..start + 4].copy_from_slice(&word.to_le_bytes());
        }
        buf[HEADER_CRC_OFFSET..HEADER_CRC_OFFSET + 4]
            .copy_from_slice(&self.header_crc32.to_le_bytes());
        buf
    }

    /// CRC32 of the serialized header with the CRC field zeroed
    pub fn compute_crc(&self) -> u32 {
        header_crc(&self.to_bytes())
    }

    /// Store a freshly computed CRC in `header_crc32`
    pub fn seal(&mut self) {
        self.header_crc32 = self.compute_crc();
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Parse and validate a header from its on-disk bytes
    ///
    /// Magic, version and CRC are all checked; any mismatch is a format error.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut fields = FieldReader::new(bytes);

        let magic = fields.take(MAGIC.len(), "header magic")?;
        if magic != MAGIC {
            return Err(PackError::Format("bad magic signature".to_string()));
        }

        let version = fields.read_u32("header version")?;
        if version != FORMAT_VERSION {
            return Err(PackError::Format(format!(
                "unsupported version {} (expected {})",
                version, FORMAT_VERSION
            )));
        }

        let pack_flags = fields.read_u32("pack flags")?;
        let toc_offset = fields.read_u64("toc offset")?;
        let toc_size = fields.read_u64("toc size")?;
        let data_offset = fields.read_u64("data offset")?;
        let pack_salt = fields.read_u64("pack salt")?;
        let mut reserved = [0u32; 8];
        for word in reserved.iter_mut() {
            *word = fields.read_u32("reserved words")?;
        }
        let header_crc32 = fields.read_u32("header crc")?;
        fields.take(HEADER_SIZE - HEADER_CRC_OFFSET - 4, "header padding")?;

        let actual = header_crc(&bytes[..HEADER_SIZE]);
        if actual != header_crc32 {
            return Err(PackError::Format(format!(
                "header crc mismatch: stored {:08x}, computed {:08x}",
                header_crc32, actual
            )));
        }

        Ok(Self {
            version,
            pack_flags,
            toc_offset,
            toc_size,
            data_offset,
            pack_salt,
            reserved,
            header_crc32,
        })
    }
}

impl Default for PackHeader {
    fn default() -> Self {
        Self::new()
    }
}

fn header_crc(bytes: &[u8]) -> u32 {
    let mut scratch = [0u8; HEADER_SIZE];
    scratch.copy_from_slice(&bytes[..HEADER_SIZE]);
    scratch[HEADER_CRC_OFFSET..HEADER_CRC_OFFSET + 4].fill(0);
    crc32(&scratch, 0)
}

/// Directory entry: where a payload lives and how to turn it back into plaintext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub flags: u16,
    /// Absolute payload offset
    pub offset: u64,
    pub size_uncompressed: u64,
    /// On-disk size after compression and obfuscation
    pub size_stored: u64,
    /// CRC32 of the original, untransformed bytes
    pub crc32: u32,
}

impl EntryInfo {
    pub fn is_compressed(&self) -> bool {
        self.flags & ENTRY_COMPRESSED != 0
    }

    pub fn is_obfuscated(&self) -> bool {
        self.flags & ENTRY_OBFUSCATED != 0
    }

    /// Flag bits this reader does not understand
    pub fn unknown_flags(&self) -> u16 {
        self.flags & !KNOWN_ENTRY_FLAGS
    }

    /// Size of this entry in the directory region
    pub fn encoded_len(&self) -> usize {
        2 + self.name.len() + ENTRY_RECORD_SIZE
    }

    /// Write `[u16 name_len][name][record]` and return the bytes written
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        let name = self.name.as_bytes();
        if name.len() > MAX_NAME_LENGTH {
            return Err(PackError::InvalidArg(format!(
                "entry name too long: {} bytes (max {})",
                name.len(),
                MAX_NAME_LENGTH
            )));
        }
        let name_len = name.len() as u16;

        writer.write_all(&name_len.to_le_bytes())?;
        writer.write_all(name)?;

        let mut record = [0u8; ENTRY_RECORD_SIZE];
        record[0..2].copy_from_slice(&self.flags.to_le_bytes());
        record[2..4].copy_from_slice(&name_len.to_le_bytes());
        // 4..8 padding
        record[8..16].copy_from_slice(&self.offset.to_le_bytes());
        record[16..24].copy_from_slice(&self.size_uncompressed.to_le_bytes());
        record[24..32].copy_from_slice(&self.size_stored.to_le_bytes());
        record[32..36].copy_from_slice(&self.crc32.to_le_bytes());
        // 36..40 padding
        writer.write_all(&record)?;

        Ok(self.encoded_len())
    }

    /// Parse one directory entry, failing if it claims more bytes than remain
    pub fn read_from(fields: &mut FieldReader<'_>) -> Result<Self> {
        let name_len = fields.read_u16("entry name length")?;
        let name_bytes = fields.take(name_len as usize, "entry name")?;
        let name = String::from_utf8(name_bytes.to_vec())
            .map_err(|e| PackError::Format(format!("entry name is not UTF-8: {}", e)))?;

        let flags = fields.read_u16("entry flags")?;
        let _name_len_copy = fields.read_u16("entry record")?;
        fields.read_u32("entry record")?;
        let offset = fields.read_u64("entry record")?;
        let size_uncompressed = fields.read_u64("entry record")?;
        let size_stored = fields.read_u64("entry record")?;
        let crc32 = fields.read_u32("entry record")?;
        fields.read_u32("entry record")?;

        Ok(Self {
            name,
            flags,
            offset,
            size_uncompressed,
            size_stored,
            crc32,
        })
    }
}

/// Bounds-checked little-endian cursor over an in-memory byte region
///
/// Every read that would run past the end fails with a format error instead of
/// yielding a short value.
#[derive(Debug)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(PackError::Format(format!(
                "truncated {}: need {} bytes, {} remain",
                what,
                len,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u16(&mut self, what: &str) -> Result<u16> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2, what)?);
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_u32(&mut self, what: &str) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self, what: &str) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(buf))
    }
}
