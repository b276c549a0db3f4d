//! `DroidAudit` sub-crate to read Android application packages and decode
//! the assets the analysis works on.
//!
//! Once the [container](Container) is inflated, the manifest, the resource
//! table and every bytecode image are decoded in parallel.

mod helpers;

pub mod container;
pub mod errors;

pub use crate::container::{Container, Limits, RawEntry};

use crate::errors::{PackageError, PackageResult};
use da_dex::DexImage;
use da_resources::config::Config;
use da_resources::errors::{ResourcesError, ResourcesResult};
use da_resources::manifest::{self, ManifestFacts};
use da_resources::table::ResourceTable;
use da_resources::xml::{self, PartialXml};
use da_utils::CancelToken;
use rayon::prelude::*;
use std::fmt;

/// A decoded Android application.
#[derive(Debug)]
pub struct Package {
    pub(crate) container: Container,
    pub(crate) manifest_name: Option<String>,
    pub(crate) manifest: Option<PartialXml>,
    pub(crate) resources: Option<ResourceTable>,
    pub(crate) dexs: Vec<(String, DexImage)>,
    pub(crate) errors: Vec<PackageError>,
    pub(crate) cancelled: bool,
}

impl Package {
    /// Reads and decodes the given archive bytes with default [`Options`].
    pub fn open(bytes: &[u8]) -> PackageResult<Self> {
        Options::default().open(bytes)
    }

    #[must_use]
    pub const fn container(&self) -> &Container {
        &self.container
    }

    /// Name of the manifest entry, when the package has one.
    #[must_use]
    pub fn manifest_name(&self) -> Option<&str> {
        self.manifest_name.as_deref()
    }

    /// The decoded manifest document, possibly partial.
    #[must_use]
    pub const fn manifest(&self) -> Option<&PartialXml> {
        self.manifest.as_ref()
    }

    /// Builds the manifest facts, resolving references through the
    /// package resource table. Returns [`None`] when there is no manifest.
    pub fn manifest_facts(
        &self,
        request: &Config,
    ) -> Option<ResourcesResult<(ManifestFacts, Vec<ResourcesError>)>> {
        let partial = self.manifest.as_ref()?;
        Some(manifest::from_partial(
            partial,
            self.resources.as_ref(),
            request,
        ))
    }

    #[must_use]
    pub const fn resources(&self) -> Option<&ResourceTable> {
        self.resources.as_ref()
    }

    /// Loaded bytecode images, in loading order.
    pub fn dexs(&self) -> impl Iterator<Item = (&str, &DexImage)> {
        self.dexs.iter().map(|(name, dex)| (name.as_str(), dex))
    }

    /// Moves the loaded bytecode images out of the package.
    pub fn take_dexs(&mut self) -> Vec<(String, DexImage)> {
        std::mem::take(&mut self.dexs)
    }

    /// Decoding errors that did not prevent opening the package.
    #[must_use]
    pub fn errors(&self) -> &[PackageError] {
        &self.errors
    }

    /// Whether reading or decoding stopped early on cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} entries:", self.container.len())?;
        for entry in self.container.iter() {
            writeln!(
                f,
                "  - {} ({} bytes, {} compressed)",
                entry.name(),
                entry.size(),
                entry.compressed_size()
            )?;
        }
        Ok(())
    }
}

/// Options to select which kind of asset is actually decoded when opening
/// a [package](Package).
#[derive(Debug, Clone)]
pub struct Options {
    parse_dex: bool,
    parse_manifest: bool,
    parse_resources: bool,
    limits: Limits,
    cancel: CancelToken,
}

/// Default values enable every decoder, with default [`Limits`].
impl Default for Options {
    fn default() -> Self {
        Self {
            parse_dex: true,
            parse_manifest: true,
            parse_resources: true,
            limits: Limits::default(),
            cancel: CancelToken::new(),
        }
    }
}

impl Options {
    /// Decode only bytecode images.
    #[must_use]
    pub fn dex_only() -> Self {
        Self {
            parse_manifest: false,
            parse_resources: false,
            ..Self::default()
        }
    }

    /// Decode only the manifest, and the resource table it refers to.
    #[must_use]
    pub fn manifest_only() -> Self {
        Self {
            parse_dex: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn resources_only() -> Self {
        Self {
            parse_dex: false,
            parse_manifest: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_limits(self, limits: Limits) -> Self {
        Self { limits, ..self }
    }

    #[must_use]
    pub fn with_cancel(self, cancel: CancelToken) -> Self {
        Self { cancel, ..self }
    }

    /// Reads and decodes an archive.
    ///
    /// Container failures and unreadable bytecode images are fatal. A
    /// resource table that cannot be decoded is recorded in
    /// [`Package::errors`].
    pub fn open(self, bytes: &[u8]) -> PackageResult<Package> {
        enum Task<'a, T> {
            Dex(&'a str, T),
            Manifest(&'a str, T),
            Resources(T),
        }

        let container = Container::open_with(bytes, self.limits, &self.cancel)?;

        let mut tasks = Vec::new();
        for entry in container.iter() {
            let name = entry.name();
            if self.parse_dex && helpers::is_dex(name) {
                tasks.push(Task::Dex(name, entry.data()));
            } else if self.parse_manifest && helpers::is_manifest(name) {
                tasks.push(Task::Manifest(name, entry.data()));
            } else if (self.parse_resources || self.parse_manifest) && helpers::is_resources(name) {
                tasks.push(Task::Resources(entry.data()));
            }
        }
        tasks.sort_by_key(|task| match task {
            Task::Manifest(name, _) => (0, (false, 0), *name),
            Task::Resources(_) => (1, (false, 0), ""),
            Task::Dex(name, _) => (2, helpers::dex_rank(name), *name),
        });

        enum Decoded {
            Dex(DexImage),
            Manifest(PartialXml),
            Resources(ResourcesResult<ResourceTable>),
        }

        let cancel = &self.cancel;
        let results = tasks
            .into_par_iter()
            .map(|task| -> PackageResult<Task<Decoded>> {
                match task {
                    Task::Dex(name, buf) => {
                        log::debug!("loading {}", name);
                        let dex = DexImage::parse_with(buf, cancel)?;
                        Ok(Task::Dex(name, Decoded::Dex(dex)))
                    }
                    Task::Manifest(name, buf) => {
                        Ok(Task::Manifest(name, Decoded::Manifest(xml::decode(buf))))
                    }
                    Task::Resources(buf) => {
                        Ok(Task::Resources(Decoded::Resources(ResourceTable::parse(buf))))
                    }
                }
            })
            .collect::<Vec<_>>();

        let mut package = Package {
            cancelled: container.is_cancelled(),
            container: Container::default(),
            manifest_name: None,
            manifest: None,
            resources: None,
            dexs: Vec::new(),
            errors: Vec::new(),
        };

        // results are in task order, so the first fatal error is reported
        for result in results {
            match result? {
                Task::Dex(name, Decoded::Dex(dex)) => {
                    package.cancelled |= dex.is_cancelled();
                    package.dexs.push((name.to_string(), dex));
                }
                Task::Manifest(name, Decoded::Manifest(partial)) => {
                    if package.manifest.is_some() {
                        log::warn!("ignoring extra manifest {}", name);
                        continue;
                    }
                    package.manifest_name = Some(name.to_string());
                    package.manifest = Some(partial);
                }
                Task::Resources(Decoded::Resources(Ok(table))) => {
                    if package.resources.is_none() {
                        package.resources = Some(table);
                    }
                }
                Task::Resources(Decoded::Resources(Err(err))) => {
                    log::warn!("resource table: {}", err);
                    package.errors.push(PackageError::Resources(err));
                }
                _ => (),
            }
        }
        package.container = container;

        Ok(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::tests::zip;
    use da_dex::builder::{ClassBuilder, DexBuilder};
    use da_resources::writer::{TableBuilder, XmlWriter};
    use da_resources::xml::XmlNode;
    use da_resources::Value;
    use zip::CompressionMethod::{Deflated, Stored};

    fn dex(class: &str) -> Vec<u8> {
        let mut builder = DexBuilder::new();
        builder.class(ClassBuilder::new(class));
        builder.build().unwrap()
    }

    fn manifest() -> Vec<u8> {
        let mut root = XmlNode::new("manifest");
        root.attributes.push(da_resources::XmlAttribute {
            namespace: None,
            name: "package".to_string(),
            resource_id: None,
            raw: Some("com.example".to_string()),
            value: Value::String("com.example".to_string()),
        });
        XmlWriter::new().write(&root)
    }

    #[test]
    fn decode_all_assets() {
        let table = TableBuilder::new(0x7f, "com.example")
            .entry("string", "app_name", Config::default(), Value::String("Demo".to_string()))
            .build();
        let (manifest, a, b) = (manifest(), dex("a.A"), dex("b.B"));
        let bytes = zip(&[
            ("AndroidManifest.xml", manifest.as_slice(), Deflated),
            ("resources.arsc", table.as_slice(), Stored),
            ("classes2.dex", b.as_slice(), Deflated),
            ("classes.dex", a.as_slice(), Deflated),
            ("res/raw/data.bin", b"\x00\x01".as_slice(), Stored),
        ]);

        let package = Package::open(&bytes).unwrap();
        assert!(!package.is_cancelled());
        assert!(package.errors().is_empty());
        assert_eq!(package.manifest_name(), Some("AndroidManifest.xml"));
        assert_eq!(package.resources().unwrap().len(), 1);
        let names = package.dexs().map(|(n, _)| n).collect::<Vec<_>>();
        assert_eq!(names, vec!["classes.dex", "classes2.dex"]);

        let (facts, warnings) = package.manifest_facts(&Config::default()).unwrap().unwrap();
        assert_eq!(facts.package, "com.example");
        assert!(warnings.is_empty());
        assert_eq!(package.container().len(), 5);
    }

    #[test]
    fn options_select_decoders() {
        let (manifest, a) = (manifest(), dex("a.A"));
        let bytes = zip(&[
            ("AndroidManifest.xml", manifest.as_slice(), Deflated),
            ("classes.dex", a.as_slice(), Deflated),
        ]);
        let package = Options::dex_only().open(&bytes).unwrap();
        assert!(package.manifest().is_none());
        assert_eq!(package.dexs().count(), 1);

        let package = Options::manifest_only().open(&bytes).unwrap();
        assert!(package.manifest().is_some());
        assert_eq!(package.dexs().count(), 0);
    }

    #[test]
    fn broken_dex_is_fatal() {
        let bytes = zip(&[("classes.dex", b"dex\n035\0 truncated".as_slice(), Stored)]);
        assert!(matches!(
            Package::open(&bytes),
            Err(PackageError::Dex(da_dex::DexError::MalformedImage(_)))
        ));
    }

    #[test]
    fn broken_table_is_recorded() {
        let manifest = manifest();
        let bytes = zip(&[
            ("AndroidManifest.xml", manifest.as_slice(), Deflated),
            ("resources.arsc", b"\x02\x00\x0c\x00".as_slice(), Stored),
        ]);
        let package = Package::open(&bytes).unwrap();
        assert!(package.resources().is_none());
        assert_eq!(package.errors().len(), 1);
        assert!(package.manifest_facts(&Config::default()).unwrap().is_ok());
    }
}
