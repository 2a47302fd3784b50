//! Build-skip cache: a digest of the options and inputs of the last
//! successful run, stored next to the outputs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use xxhash_rust::xxh3::Xxh3;

use crate::input::InputFile;

pub struct BuildCache {
    path: PathBuf,
}

impl BuildCache {
    pub fn new(out_dir: &Path, name: &str) -> Self {
        Self {
            path: out_dir.join(format!("{name}.hash")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the stored digest equals `digest`. A missing or unreadable
    /// file counts as stale.
    pub fn is_fresh(&self, digest: u64) -> bool {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| u64::from_str_radix(s.trim(), 16).ok())
            == Some(digest)
    }

    pub fn store(&self, digest: u64) -> anyhow::Result<()> {
        fs::write(&self.path, format!("{digest:016x}\n"))
            .with_context(|| format!("write {}", self.path.display()))
    }
}

/// Digest over the serialized options plus every input's name, path and bytes.
pub fn digest(options: &[u8], files: &[InputFile]) -> anyhow::Result<u64> {
    let mut hasher = Xxh3::new();
    hasher.update(options);
    for f in files {
        let bytes = fs::read(&f.path).with_context(|| format!("read {}", f.path.display()))?;
        hasher.update(f.name.as_bytes());
        hasher.update(&[0]);
        hasher.update(f.path.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(hasher.digest())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(dir: &Path, name: &str, body: &[u8]) -> InputFile {
        let path = dir.join(format!("{name}.png"));
        fs::write(&path, body).unwrap();
        InputFile {
            path,
            name: name.to_string(),
        }
    }

    #[test]
    fn digest_tracks_options_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let a = file(dir.path(), "a", b"one");
        let base = digest(b"opts", std::slice::from_ref(&a)).unwrap();
        assert_eq!(base, digest(b"opts", std::slice::from_ref(&a)).unwrap());
        assert_ne!(base, digest(b"other", std::slice::from_ref(&a)).unwrap());

        fs::write(&a.path, b"two").unwrap();
        assert_ne!(base, digest(b"opts", std::slice::from_ref(&a)).unwrap());

        let b = file(dir.path(), "b", b"x");
        assert_ne!(base, digest(b"opts", &[a, b]).unwrap());
    }

    #[test]
    fn store_then_check() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BuildCache::new(dir.path(), "atlas");
        assert!(!cache.is_fresh(7));
        cache.store(7).unwrap();
        assert!(cache.path().ends_with("atlas.hash"));
        assert!(cache.is_fresh(7));
        assert!(!cache.is_fresh(8));
    }
}
