//! Path hashing and category mapping.
//!
//! The archive's lookup tables key entries by CRC-32 of the lowercased
//! path: the one-part table hashes the whole path, the two-part table
//! hashes the folder component and the file name separately, split at
//! the last `/`. The archive stores the CRC without the final inversion.
//!
//! The catalog itself never computes hashes for on-disk records (those
//! arrive pre-hashed from the decoder); this module exists for the
//! upload surface, which must re-hash submitted literal paths, and for
//! filling in the missing half of one-sided collision records.

use crate::keys::{FullKey, IndexId};

/// Hash one component the way the archive's tables do
pub fn hash_component(data: &str) -> u32 {
    // The tables store the CRC pre-inversion (JAMCRC variant).
    !crc32fast::hash(data.as_bytes())
}

/// Hashes of a path at both granularities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathHashes {
    pub folder_hash: u32,
    pub file_hash: u32,
    pub full_hash: u32,
}

/// Compute all three hashes of a literal path.
///
/// Paths are lowercased before hashing; a path without any `/` hashes an
/// empty folder component.
pub fn hash_path(path: &str) -> PathHashes {
    let lowered = path.to_ascii_lowercase();
    let (folder, file) = match lowered.rfind('/') {
        Some(pos) => (&lowered[..pos], &lowered[pos + 1..]),
        None => ("", lowered.as_str()),
    };
    PathHashes {
        folder_hash: hash_component(folder),
        file_hash: hash_component(file),
        full_hash: hash_component(&lowered),
    }
}

/// Compute the full identity a literal path would occupy in the catalog,
/// or `None` if its leading component names no known category.
pub fn key_for_path(path: &str) -> Option<FullKey> {
    let index_id = category_id_for_path(path)?;
    let hashes = hash_path(path);
    Some(FullKey::new(
        index_id,
        hashes.folder_hash,
        hashes.file_hash,
        hashes.full_hash,
    ))
}

// Category byte by leading path component.
const CATEGORIES: &[(&str, u32)] = &[
    ("common", 0x00),
    ("bgcommon", 0x01),
    ("bg", 0x02),
    ("cut", 0x03),
    ("chara", 0x04),
    ("shader", 0x05),
    ("ui", 0x06),
    ("sound", 0x07),
    ("vfx", 0x08),
    ("ui_script", 0x09),
    ("exd", 0x0a),
    ("game_script", 0x0b),
    ("music", 0x0c),
    ("sqpack_test", 0x12),
    ("debug", 0x13),
];

/// Map a path to its archive segment: category byte in the high 16 bits,
/// expansion number (from an `exN` second component) in the middle byte.
pub fn category_id_for_path(path: &str) -> Option<IndexId> {
    let lowered = path.to_ascii_lowercase();
    let mut parts = lowered.split('/');
    let head = parts.next()?;
    let category = CATEGORIES
        .iter()
        .find(|(name, _)| *name == head)
        .map(|(_, id)| *id)?;

    let expansion = parts
        .next()
        .and_then(|p| p.strip_prefix("ex"))
        .and_then(|n| n.parse::<u32>().ok())
        .unwrap_or(0);

    Some(IndexId((category << 16) | (expansion << 8)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_path_splits_at_last_slash() {
        let hashes = hash_path("exd/root.exl");
        assert_eq!(hashes.folder_hash, hash_component("exd"));
        assert_eq!(hashes.file_hash, hash_component("root.exl"));
        assert_eq!(hashes.full_hash, hash_component("exd/root.exl"));
    }

    #[test]
    fn test_hash_path_is_case_insensitive() {
        assert_eq!(hash_path("Exd/Root.exl"), hash_path("exd/root.exl"));
    }

    #[test]
    fn test_hash_path_without_folder() {
        let hashes = hash_path("root.exl");
        assert_eq!(hashes.folder_hash, hash_component(""));
        assert_eq!(hashes.file_hash, hash_component("root.exl"));
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(category_id_for_path("exd/root.exl"), Some(IndexId(0x0a0000)));
        assert_eq!(
            category_id_for_path("common/font/font1.tex"),
            Some(IndexId(0x000000))
        );
        assert_eq!(category_id_for_path("bogus/file.dat"), None);
    }

    #[test]
    fn test_expansion_shifts_segment_id() {
        assert_eq!(
            category_id_for_path("bg/ex1/01_rom_r2/twn/r2t1/level/bg.lgb"),
            Some(IndexId(0x020100))
        );
        assert_eq!(
            category_id_for_path("bg/ffxiv/sea_s1/twn/s1t1/level/bg.lgb"),
            Some(IndexId(0x020000))
        );
    }

    #[test]
    fn test_key_for_path_uses_category_and_hashes() {
        let key = key_for_path("exd/root.exl").unwrap();
        assert_eq!(key.index_id, IndexId(0x0a0000));
        assert_eq!(key.full_hash, hash_component("exd/root.exl"));
        assert!(key_for_path("nonsense").is_none());
    }
}
