//! Helpers shared by unit tests

use crate::detection::Digest;
use std::fs;
use std::path::{Path, PathBuf};

/// Smallest decimal counter whose digest starts with `want`
pub fn bytes_with_digest_prefix(want: char) -> Vec<u8> {
    (0u32..)
        .map(|n| n.to_string().into_bytes())
        .find(|bytes| Digest::of(bytes).as_str().starts_with(want))
        .unwrap()
}

/// Smallest decimal counter whose digest does not start with `'a'`
pub fn clean_bytes() -> Vec<u8> {
    (0u32..)
        .map(|n| n.to_string().into_bytes())
        .find(|bytes| !Digest::of(bytes).as_str().starts_with('a'))
        .unwrap()
}

/// Write `contents` to `dir/name`, creating parent directories
pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}
