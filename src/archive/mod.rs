mod format;
mod reader;
mod writer;

pub use format::{
    EntryInfo, FieldReader, PackHeader, ENTRY_COMPRESSED, ENTRY_OBFUSCATED, ENTRY_RECORD_SIZE,
    FORMAT_VERSION, HEADER_CRC_OFFSET, HEADER_SIZE, KNOWN_ENTRY_FLAGS, MAGIC, MAX_NAME_LENGTH,
    PACK_FLAG_OBFUSCATED,
};
pub use reader::PackReader;
pub use writer::PackWriter;
