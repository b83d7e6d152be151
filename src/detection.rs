//! File fingerprints and detection rules
//!
//! A fingerprint is the MD5 digest of the first few bytes of a file. It is a
//! cheap label, not a content hash: two files sharing the
//! same prefix get the same digest.
//!
//! The only shipped rule, [`Md5PrefixRule`], is a placeholder that flags any
//! digest starting with `'a'`. It stands in for a real signature or heuristic
//! engine and must not be mistaken for malware detection. Real engines plug in
//! through [`DetectionRule`].

use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// 128-bit MD5 digest rendered as 32 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Digest of `bytes`
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", md5::compute(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read at most `limit` leading bytes of a file
pub fn read_prefix(path: &Path, limit: usize) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// What a rule gets to look at for one file
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub prefix: &'a [u8],
    pub digest: &'a Digest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Suspicious,
}

impl Verdict {
    pub fn is_suspicious(self) -> bool {
        matches!(self, Verdict::Suspicious)
    }
}

/// Pluggable detection predicate.
///
/// Implementations must be deterministic: the same sample always yields the
/// same verdict.
pub trait DetectionRule: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, sample: &Sample<'_>) -> Verdict;
}

/// Placeholder rule: digest's first hex character is `'a'`.
///
/// Roughly one file in sixteen is flagged. Keep it exactly this trivial.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5PrefixRule;

impl DetectionRule for Md5PrefixRule {
    fn name(&self) -> &str {
        "md5-prefix-a"
    }

    fn evaluate(&self, sample: &Sample<'_>) -> Verdict {
        if sample.digest.as_str().starts_with('a') {
            Verdict::Suspicious
        } else {
            Verdict::Clean
        }
    }
}
