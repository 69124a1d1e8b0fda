//==================================================
// File: fingerprint.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Configuration digest for persisted binding caches
// Objective: Detect when a stored snapshot was produced by a different setup
//==================================================

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pseudo::PseudoPrefixPolicy;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x1000_0000_01b3;
const FIELD_END: u8 = 0xff;

/// Configuration flags that change what a binding means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintFlags {
    pub include_env_paths: bool,
    pub extension: String,
    pub separator: char,
    pub pseudo_prefix: PseudoPrefixPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Digest over the ordered base paths and flags.
    ///
    /// Each field is terminated by a byte that cannot occur in UTF-8 text so
    /// that `["ab", "c"]` and `["a", "bc"]` hash differently.
    pub fn compute(base_paths: &[PathBuf], flags: &FingerprintFlags) -> Self {
        let mut hasher = Fnv1a::new();
        hasher.write(&(base_paths.len() as u64).to_le_bytes());
        for path in base_paths {
            hasher.write(path.to_string_lossy().as_bytes());
            hasher.write(&[FIELD_END]);
        }
        hasher.write(&[u8::from(flags.include_env_paths)]);
        hasher.write(flags.extension.as_bytes());
        hasher.write(&[FIELD_END]);
        let mut buf = [0u8; 4];
        hasher.write(flags.separator.encode_utf8(&mut buf).as_bytes());
        hasher.write(&[FIELD_END]);
        hasher.write(flags.pseudo_prefix.describe().as_bytes());
        hasher.write(&[FIELD_END]);
        hasher.write(env!("CARGO_PKG_VERSION").as_bytes());
        Fingerprint(hasher.finish())
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// FNV-1a, also used to turn arbitrary cache keys into file names.
pub(crate) struct Fnv1a(u64);

impl Fnv1a {
    pub(crate) fn new() -> Self {
        Fnv1a(FNV_OFFSET_BASIS)
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= *byte as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    pub(crate) fn finish(&self) -> u64 {
        self.0
    }
}

pub(crate) fn hash_hex(bytes: &[u8]) -> String {
    let mut hasher = Fnv1a::new();
    hasher.write(bytes);
    format!("{:016x}", hasher.finish())
}
