//! Password-keyed XOR keystream.
//!
//! The keystream is a Numerical Recipes LCG whose high byte is XORed over the
//! payload. It keeps casual tooling from reading packed assets; it is not
//! encryption and offers no confidentiality against a motivated attacker.

use crate::util::fnv1a64;

/// Replacement for a derived seed of zero, which means "no obfuscation"
const ZERO_SEED_FALLBACK: u32 = 0xA5A5_A5A5;

const LCG_MULTIPLIER: u32 = 1_664_525;
const LCG_INCREMENT: u32 = 1_013_904_223;

/// Derive the 32-bit keystream seed for `password` and a pack's salt.
///
/// `None` hashes like the empty string. The result is never zero.
pub fn derive_seed(password: Option<&str>, pack_salt: u64) -> u32 {
    let password = password.unwrap_or("");

    let mut parts = [0u8; 16];
    parts[..8].copy_from_slice(&pack_salt.to_le_bytes());
    parts[8..].copy_from_slice(&fnv1a64(password.as_bytes()).to_le_bytes());

    let mix = fnv1a64(&parts);
    match (mix ^ (mix >> 32)) as u32 {
        0 => ZERO_SEED_FALLBACK,
        seed => seed,
    }
}

/// XOR the keystream for `seed` over `data` in place.
///
/// Applying it twice with the same seed restores the input. A zero seed or an
/// empty buffer leaves `data` untouched.
pub fn apply_keystream(seed: u32, data: &mut [u8]) {
    if seed == 0 {
        return;
    }

    let mut state = seed;
    for byte in data.iter_mut() {
        state = state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        *byte ^= (state >> 24) as u8;
    }
}
