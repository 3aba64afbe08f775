//! Hashing and arithmetic helpers shared by the builder and the reader.

/// FNV-1a 64-bit offset basis
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash of `data`.
///
/// Only used to mix passwords and salts into keystream seeds, never for integrity.
pub fn fnv1a64(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// CRC-32 (IEEE 802.3, bit-reflected) of `data`, continuing from `seed`.
///
/// A seed of 0 yields the standard checksum; passing a previous result as the
/// seed continues the checksum across split buffers.
pub fn crc32(data: &[u8], seed: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(seed);
    hasher.update(data);
    hasher.finalize()
}

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two; 0 and 1 both mean "no padding".
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    let mask = alignment - 1;
    (value + mask) & !mask
}
