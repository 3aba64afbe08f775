//! Obfuscation and Password Handling
//!
//! Obfuscated entries need the build password to come back out. Anything else
//! (no password, empty password, wrong password) is reported as BadPassword,
//! while unobfuscated entries in the same pack stay readable.

use leopack::obfuscate::{apply_keystream, derive_seed};
use leopack::{BuildOptions, ErrorCode, PackReader, PackWriter, HEADER_SIZE};
use tempfile::NamedTempFile;

const PASSWORD: &str = "s3cr3t";

/// Helper: pack with one plain, one obfuscated and one obfuscated+compressed entry
fn create_obfuscated_pack() -> NamedTempFile {
    let temp_file = NamedTempFile::new().unwrap();
    let options = BuildOptions::new().with_password(PASSWORD);
    let mut writer = PackWriter::begin(temp_file.path(), options).unwrap();
    writer.add("public.txt", b"anyone can read this", false, false).unwrap();
    writer.add("private.txt", b"only with the password", false, true).unwrap();
    writer
        .add("private.lua", &b"return { hp = 100 }\n".repeat(50), true, true)
        .unwrap();
    writer.end().unwrap();
    temp_file
}

#[test]
fn test_correct_password_roundtrip() {
    let temp_file = create_obfuscated_pack();
    let mut reader = PackReader::open(temp_file.path(), Some(PASSWORD)).unwrap();

    assert!(reader.has_obfuscated_entries());
    assert_eq!(reader.read_entry("public.txt").unwrap(), b"anyone can read this");
    assert_eq!(reader.read_entry("private.txt").unwrap(), b"only with the password");
    assert_eq!(
        reader.read_entry("private.lua").unwrap(),
        b"return { hp = 100 }\n".repeat(50)
    );
}

#[test]
fn test_wrong_password_is_bad_password() {
    let temp_file = create_obfuscated_pack();
    let mut reader = PackReader::open(temp_file.path(), Some("s3cr3T")).unwrap();

    let err = reader.read_entry("private.txt").unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadPassword);
    let err = reader.read_entry("private.lua").unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadPassword);

    assert_eq!(reader.read_entry("public.txt").unwrap(), b"anyone can read this");
}

#[test]
fn test_missing_or_empty_password_opens_but_cannot_extract() {
    let temp_file = create_obfuscated_pack();

    for password in [None, Some("")] {
        let mut reader = PackReader::open(temp_file.path(), password).unwrap();
        assert_eq!(reader.count(), 3);

        let mut dst = vec![0u8; 64];
        let index = reader.find("private.txt").unwrap();
        let err = reader.extract_index(index, &mut dst).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadPassword);

        let err = reader.read_entry("private.lua").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadPassword);
    }
}

#[test]
fn test_password_ignored_for_unobfuscated_pack() {
    let temp_file = NamedTempFile::new().unwrap();
    let options = BuildOptions::new().with_password(PASSWORD);
    let mut writer = PackWriter::begin(temp_file.path(), options).unwrap();
    writer.add("plain.txt", b"plain", true, false).unwrap();
    writer.end().unwrap();

    // Password configured but never used: the pack flag stays clear
    let mut reader = PackReader::open(temp_file.path(), Some("anything")).unwrap();
    assert!(!reader.has_obfuscated_entries());
    assert_eq!(reader.read_entry("plain.txt").unwrap(), b"plain");
}

#[test]
fn test_stored_bytes_match_keystream() {
    let temp_file = NamedTempFile::new().unwrap();
    let options = BuildOptions::new().with_password(PASSWORD);
    let mut writer = PackWriter::begin(temp_file.path(), options).unwrap();
    writer.add("x.bin", b"known plaintext", false, true).unwrap();
    writer.end().unwrap();

    let reader = PackReader::open(temp_file.path(), Some(PASSWORD)).unwrap();
    let salt = reader.header().pack_salt;
    let entry = reader.stat(0).unwrap().clone();
    drop(reader);

    let bytes = std::fs::read(temp_file.path()).unwrap();
    let start = entry.offset as usize;
    let mut stored = bytes[start..start + entry.size_stored as usize].to_vec();
    assert_eq!(start, HEADER_SIZE);
    assert_ne!(stored, b"known plaintext");

    // The keystream is its own inverse
    apply_keystream(derive_seed(Some(PASSWORD), salt), &mut stored);
    assert_eq!(stored, b"known plaintext");
}

#[test]
fn test_obfuscation_requires_configured_password() {
    let temp_file = NamedTempFile::new().unwrap();
    let mut writer = PackWriter::create(temp_file.path()).unwrap();

    let err = writer.add("secret.txt", b"data", true, true).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArg);

    // The rejected entry leaves the session usable
    writer.add("secret.txt", b"data", false, false).unwrap();
    writer.end().unwrap();

    let mut reader = PackReader::open(temp_file.path(), None).unwrap();
    assert_eq!(reader.read_entry("secret.txt").unwrap(), b"data");
}

#[test]
fn test_zero_length_obfuscated_entry() {
    let temp_file = NamedTempFile::new().unwrap();
    let options = BuildOptions::new().with_password(PASSWORD);
    let mut writer = PackWriter::begin(temp_file.path(), options).unwrap();
    writer.add("empty.key", b"", true, true).unwrap();
    writer.end().unwrap();

    let mut reader = PackReader::open(temp_file.path(), Some(PASSWORD)).unwrap();
    assert!(reader.has_obfuscated_entries());
    assert_eq!(reader.extract_index(0, &mut []).unwrap(), 0);

    // Without a key even an empty obfuscated entry is refused
    let mut reader = PackReader::open(temp_file.path(), None).unwrap();
    let err = reader.extract_index(0, &mut []).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadPassword);
}
