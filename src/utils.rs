//! Shared utilities for secscan
//!
//! Path helpers used by the scanner and the terminal front end, plus the
//! size parser behind `--max-size`.

use std::path::Path;

/// Normalize a path for display (strip Windows long-path prefixes).
pub fn display_path(path: &Path) -> String {
    let path_str = path.to_string_lossy().to_string();
    #[cfg(windows)]
    {
        if let Some(stripped) = path_str.strip_prefix(r"\\?\UNC\") {
            return format!(r"\\{}", stripped);
        }
        if let Some(stripped) = path_str.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }
    path_str
}

/// Short name used in analysis headers (`AI Analysis for <name>`).
///
/// Falls back to the full display path when the path has no file name.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| display_path(path))
}

/// Returns true if this path is a Windows reparse point (junction/symlink/mount point).
///
/// `walkdir`'s `follow_links(false)` does not stop it from descending into
/// junctions, which can create cycles in the walk.
pub fn is_windows_reparse_point(path: &Path) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x0400;
        if let Ok(meta) = std::fs::symlink_metadata(path) {
            return meta.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0;
        }
        false
    }
    #[cfg(not(windows))]
    {
        let _ = path;
        false
    }
}

/// Parse a human size such as `10MB`, `512KB`, `1.5GB` or a plain byte count.
///
/// `KB`/`MB`/`GB` are decimal (1 MB = 1,000,000 bytes), matching the default
/// ceiling of 10,000,000 bytes; `KiB`/`MiB`/`GiB` are binary.
pub fn parse_size(input: &str) -> Result<u64, String> {
    input
        .trim()
        .parse::<bytesize::ByteSize>()
        .map(|size| size.as_u64())
}
