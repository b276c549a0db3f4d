//! Archive reading with decompression guards.

use crate::errors::{PackageError, PackageResult};
use da_utils::CancelToken;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use zip::result::ZipError;
use zip::ZipArchive;

/// Entries smaller than this are not subject to the ratio check: tiny
/// highly compressible files are common and harmless.
const RATIO_FLOOR: u64 = 1024 * 1024;

/// Bounds enforced while inflating an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum uncompressed to compressed size ratio of an entry.
    pub max_ratio: u64,
    /// Maximum uncompressed size of one entry.
    pub max_entry_size: u64,
    /// Maximum uncompressed size of all entries.
    pub max_total_size: u64,
    pub max_entries: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_ratio: 100,
            max_entry_size: 256 * 1024 * 1024,
            max_total_size: 1024 * 1024 * 1024,
            max_entries: 65_536,
        }
    }
}

impl Limits {
    #[must_use]
    pub const fn with_max_ratio(self, max_ratio: u64) -> Self {
        Self { max_ratio, ..self }
    }

    #[must_use]
    pub const fn with_max_entry_size(self, max_entry_size: u64) -> Self {
        Self {
            max_entry_size,
            ..self
        }
    }

    #[must_use]
    pub const fn with_max_total_size(self, max_total_size: u64) -> Self {
        Self {
            max_total_size,
            ..self
        }
    }

    #[must_use]
    pub const fn with_max_entries(self, max_entries: usize) -> Self {
        Self {
            max_entries,
            ..self
        }
    }

    /// Checks the declared sizes of an entry before inflating it.
    fn check(&self, name: &str, compressed: u64, size: u64, total: u64) -> PackageResult<()> {
        if size > self.max_entry_size {
            return Err(PackageError::ContainerTooLarge(format!(
                "{name} inflates to {size} bytes (limit is {})",
                self.max_entry_size
            )));
        }
        if total.saturating_add(size) > self.max_total_size {
            return Err(PackageError::ContainerTooLarge(format!(
                "entries inflate to more than {} bytes",
                self.max_total_size
            )));
        }
        if size > RATIO_FLOOR && size / compressed.max(1) > self.max_ratio {
            return Err(PackageError::ContainerTooLarge(format!(
                "{name} has a compression ratio above {}:1 ({size} bytes from {compressed})",
                self.max_ratio
            )));
        }
        Ok(())
    }
}

/// One archive entry, inflated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    name: String,
    compressed_size: u64,
    data: Vec<u8>,
}

impl RawEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// The inflated entries of an archive, in archive order.
#[derive(Debug, Default)]
pub struct Container {
    entries: Vec<RawEntry>,
    index: BTreeMap<String, usize>,
    cancelled: bool,
}

fn corrupt(err: ZipError) -> PackageError {
    PackageError::ContainerCorrupt(err.to_string())
}

impl Container {
    /// Reads an archive with default [`Limits`].
    pub fn open(bytes: &[u8]) -> PackageResult<Self> {
        Self::open_with(bytes, Limits::default(), &CancelToken::new())
    }

    /// Reads an archive, checking `cancel` between entries. A cancelled
    /// read returns the entries inflated so far.
    pub fn open_with(bytes: &[u8], limits: Limits, cancel: &CancelToken) -> PackageResult<Self> {
        log::debug!(">> container");

        let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;
        if zip.len() > limits.max_entries {
            return Err(PackageError::ContainerTooLarge(format!(
                "{} entries (limit is {})",
                zip.len(),
                limits.max_entries
            )));
        }

        let mut container = Self::default();
        let mut total = 0u64;
        for i in 0..zip.len() {
            if cancel.is_cancelled() {
                log::warn!("container reading cancelled after {} entries", i);
                container.cancelled = true;
                break;
            }

            let mut file = zip.by_index(i).map_err(corrupt)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let size = file.size();
            let compressed_size = file.compressed_size();
            limits.check(&name, compressed_size, size, total)?;

            // one byte more than declared is enough to detect a lying header
            let mut data = Vec::with_capacity(size.min(RATIO_FLOOR) as usize);
            Read::by_ref(&mut file)
                .take(size.saturating_add(1))
                .read_to_end(&mut data)
                .map_err(|err| PackageError::ContainerCorrupt(format!("{name}: {err}")))?;
            let actual = data.len() as u64;
            if actual > size {
                return Err(PackageError::ContainerTooLarge(format!(
                    "{name} inflates past its declared size of {size} bytes"
                )));
            }
            if actual < size {
                return Err(PackageError::ContainerCorrupt(format!(
                    "{name} inflates to {actual} bytes but declares {size}"
                )));
            }
            total += actual;

            log::trace!("{} ({} -> {} bytes)", name, compressed_size, actual);
            if container.index.contains_key(&name) {
                log::warn!("duplicate entry {:?} ignored", name);
                continue;
            }
            container.index.insert(name.clone(), container.entries.len());
            container.entries.push(RawEntry {
                name,
                compressed_size,
                data,
            });
        }

        log::debug!("container::entries = {}", container.entries.len());
        log::debug!("<< container");
        Ok(container)
    }

    /// Names of the entries, in archive order.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(RawEntry::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&RawEntry> {
        self.index.get(name).map(|i| &self.entries[*i])
    }

    pub fn read(&self, name: &str) -> PackageResult<&[u8]> {
        self.entry(name)
            .map(RawEntry::data)
            .ok_or_else(|| PackageError::EntryNotFound(name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    pub(crate) fn zip(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, method) in entries {
            let options = FileOptions::default().compression_method(*method);
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn stored_and_deflated() {
        let bytes = zip(&[
            ("a.txt", b"hello".as_slice(), CompressionMethod::Stored),
            ("dir/b.txt", b"world world world".as_slice(), CompressionMethod::Deflated),
        ]);
        let container = Container::open(&bytes).unwrap();
        assert_eq!(container.entries().collect::<Vec<_>>(), vec!["a.txt", "dir/b.txt"]);
        assert_eq!(container.read("a.txt").unwrap(), b"hello");
        assert_eq!(container.read("dir/b.txt").unwrap(), b"world world world");
        assert_eq!(container.entry("a.txt").unwrap().size(), 5);
        assert!(matches!(
            container.read("missing"),
            Err(PackageError::EntryNotFound(_))
        ));
    }

    #[test]
    fn garbage_is_corrupt() {
        assert!(matches!(
            Container::open(b"definitely not a zip"),
            Err(PackageError::ContainerCorrupt(_))
        ));
    }

    #[test]
    fn ratio_guard() {
        let zeros = vec![0u8; 4 * 1024 * 1024];
        let bytes = zip(&[("bomb", zeros.as_slice(), CompressionMethod::Deflated)]);
        assert!(matches!(
            Container::open(&bytes),
            Err(PackageError::ContainerTooLarge(_))
        ));

        // small entries are not subject to the ratio
        let zeros = vec![0u8; 64 * 1024];
        let bytes = zip(&[("small", zeros.as_slice(), CompressionMethod::Deflated)]);
        assert_eq!(Container::open(&bytes).unwrap().len(), 1);
    }

    #[test]
    fn size_limits() {
        let bytes = zip(&[
            ("a", [1u8; 100].as_slice(), CompressionMethod::Stored),
            ("b", [2u8; 100].as_slice(), CompressionMethod::Stored),
        ]);
        let cancel = CancelToken::new();
        let limits = Limits::default();
        assert!(Container::open_with(&bytes, limits.with_max_entry_size(99), &cancel).is_err());
        assert!(Container::open_with(&bytes, limits.with_max_total_size(150), &cancel).is_err());
        assert!(Container::open_with(&bytes, limits.with_max_entries(1), &cancel).is_err());
        assert!(Container::open_with(&bytes, limits.with_max_total_size(200), &cancel).is_ok());
    }

    #[test]
    fn declared_size_mismatch() {
        let mut bytes = zip(&[("a.txt", b"hello".as_slice(), CompressionMethod::Stored)]);
        let central = bytes
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .unwrap();
        bytes[central + 24..central + 28].copy_from_slice(&10u32.to_le_bytes());
        assert!(matches!(
            Container::open(&bytes),
            Err(PackageError::ContainerCorrupt(_))
        ));
    }

    #[test]
    fn cancelled_read_is_partial() {
        let bytes = zip(&[("a", b"1".as_slice(), CompressionMethod::Stored)]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let container = Container::open_with(&bytes, Limits::default(), &cancel).unwrap();
        assert!(container.is_cancelled());
        assert!(container.is_empty());
    }
}
