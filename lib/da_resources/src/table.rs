//! Compiled resource tables (`resources.arsc`) and configuration-aware
//! resource resolution.

use crate::config::Config;
use crate::errors::{ResourcesError, ResourcesResult};
use crate::parsers::table_parser;
use crate::strings::StringPool;
use crate::values::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Maximum number of references followed when resolving a value.
const MAX_REFERENCE_DEPTH: usize = 16;

/// A resource identifier, `0xPPTTEEEE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceId(pub u32);

impl ResourceId {
    #[must_use]
    pub const fn new(package: u8, typ: u8, entry: u16) -> Self {
        Self(((package as u32) << 24) | ((typ as u32) << 16) | entry as u32)
    }

    #[must_use]
    pub const fn package(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[must_use]
    pub const fn typ(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[must_use]
    pub const fn entry(self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// A package chunk of a resource table, with its type and key names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePackage {
    pub(crate) id: u8,
    pub(crate) name: String,
    pub(crate) type_strings: StringPool,
    pub(crate) key_strings: StringPool,
    pub(crate) type_specs: BTreeMap<u8, u32>,
}

impl TablePackage {
    #[must_use]
    pub const fn id(&self) -> u8 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.type_strings.iter()
    }

    /// Number of entries declared by the type spec of `typ`, if any.
    #[must_use]
    pub fn declared_entries(&self, typ: u8) -> Option<u32> {
        self.type_specs.get(&typ).copied()
    }
}

/// A style or bag entry, kept undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexEntry {
    pub parent: u32,
    pub count: u32,
    pub blob: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    Simple(Value),
    Complex(ComplexEntry),
}

impl fmt::Display for EntryValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Simple(Value::String(s)) => write!(f, "{s:?}"),
            Self::Simple(value) => write!(f, "{value}"),
            Self::Complex(complex) => {
                write!(f, "<bag parent={:#010x} count={}>", complex.parent, complex.count)
            }
        }
    }
}

/// The value of one resource under one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub config: Config,
    pub type_name: String,
    pub key: String,
    pub value: EntryValue,
}

impl TableEntry {
    #[must_use]
    pub fn simple_value(&self) -> Option<&Value> {
        match &self.value {
            EntryValue::Simple(value) => Some(value),
            EntryValue::Complex(_) => None,
        }
    }
}

/// A decoded resource table.
///
/// Entries are indexed by resource id, each id holding one entry per
/// configuration. Malformed type chunks are skipped and kept as warnings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceTable {
    pub(crate) strings: StringPool,
    pub(crate) packages: Vec<TablePackage>,
    pub(crate) entries: BTreeMap<ResourceId, Vec<TableEntry>>,
    pub(crate) warnings: Vec<ResourcesError>,
}

impl ResourceTable {
    /// Decodes a `resources.arsc` buffer.
    ///
    /// Fails with [`ResourcesError::MalformedResourceTable`] when the table
    /// or one of its package headers cannot be decoded at all.
    pub fn parse(input: &[u8]) -> ResourcesResult<Self> {
        table_parser(input)
    }

    pub(crate) fn insert(&mut self, id: ResourceId, entry: TableEntry) {
        let slot = self.entries.entry(id).or_default();
        if slot.iter().any(|other| other.config == entry.config) {
            log::warn!("duplicate entry for {} under [{}]", id, entry.config);
            return;
        }
        slot.push(entry);
    }

    #[must_use]
    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    #[must_use]
    pub fn packages(&self) -> &[TablePackage] {
        &self.packages
    }

    /// Errors met on type chunks that were skipped while decoding.
    #[must_use]
    pub fn warnings(&self) -> &[ResourcesError] {
        &self.warnings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &[TableEntry])> {
        self.entries.iter().map(|(id, entries)| (*id, entries.as_slice()))
    }

    /// Every configuration stored for `id`.
    #[must_use]
    pub fn entries(&self, id: ResourceId) -> &[TableEntry] {
        self.entries.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Selects the entry of `id` that best matches `request`.
    ///
    /// Among the configurations compatible with the request, the closest
    /// one wins (see [`Config::compare_for`]); the default configuration is
    /// always compatible. When only conflicting configurations exist, the
    /// first one in canonical order is returned.
    pub fn resolve(&self, id: ResourceId, request: &Config) -> ResourcesResult<&TableEntry> {
        let candidates = self
            .entries
            .get(&id)
            .filter(|entries| !entries.is_empty())
            .ok_or(ResourcesError::ResourceNotFound(id.0))?;

        let best = candidates
            .iter()
            .filter(|entry| entry.config.is_compatible_with(request))
            .max_by(|a, b| a.config.compare_for(&b.config, request));

        match best {
            Some(entry) => Ok(entry),
            None => candidates
                .iter()
                .min_by(|a, b| a.config.cmp(&b.config))
                .ok_or(ResourcesError::ResourceNotFound(id.0)),
        }
    }

    /// Resolves `id` to a simple value, following references.
    ///
    /// A complex entry resolves to a reference to itself.
    pub fn resolve_value(&self, id: ResourceId, request: &Config) -> ResourcesResult<Value> {
        let mut current = id;
        for _ in 0..MAX_REFERENCE_DEPTH {
            match &self.resolve(current, request)?.value {
                EntryValue::Simple(Value::Reference(next)) if *next != 0 => {
                    current = ResourceId(*next);
                }
                EntryValue::Simple(value) => return Ok(value.clone()),
                EntryValue::Complex(_) => return Ok(Value::Reference(current.0)),
            }
        }
        Err(ResourcesError::ReferenceLoop(id.0))
    }

    /// Resolves `value` if it is a reference, returns it as is otherwise.
    pub fn resolve_reference(&self, value: &Value, request: &Config) -> ResourcesResult<Value> {
        match value {
            Value::Reference(id) => self.resolve_value(ResourceId(*id), request),
            other => Ok(other.clone()),
        }
    }

    /// Looks up the id of `type_name/key` in any package.
    #[must_use]
    pub fn find(&self, type_name: &str, key: &str) -> Option<ResourceId> {
        self.entries.iter().find_map(|(id, entries)| {
            entries
                .iter()
                .any(|entry| entry.type_name == type_name && entry.key == key)
                .then_some(*id)
        })
    }

    #[must_use]
    pub fn summary(&self) -> ResourcesSummary {
        let mut summary = ResourcesSummary {
            packages: self
                .packages
                .iter()
                .map(|package| PackageSummary {
                    id: package.id,
                    name: package.name.clone(),
                })
                .collect(),
            total_entries: self.entries.len(),
            ..ResourcesSummary::default()
        };

        for (id, entries) in &self.entries {
            let Some(first) = entries.first() else {
                continue;
            };
            *summary.types.entry(first.type_name.clone()).or_default() += 1;

            let default_string = entries
                .iter()
                .find(|entry| entry.config.is_default())
                .and_then(TableEntry::simple_value)
                .and_then(Value::as_str);
            if let Some(value) = default_string {
                let package = self
                    .packages
                    .iter()
                    .find(|package| package.id == id.package())
                    .map_or("", |package| package.name.as_str());
                summary.strings.insert(
                    format!("{package}:{}/{}", first.type_name, first.key),
                    value.to_string(),
                );
            }
        }

        summary
    }
}

/// Prints the table the way `aapt dump resources` does, one line per
/// entry and configuration.
impl fmt::Display for ResourceTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for package in &self.packages {
            writeln!(f, "Package {:#04x} {}", package.id, package.name)?;
            for (id, entries) in self
                .entries
                .iter()
                .filter(|(id, _)| id.package() == package.id)
            {
                for entry in entries {
                    writeln!(
                        f,
                        "  {} {}/{} [{}] {}",
                        id, entry.type_name, entry.key, entry.config, entry.value
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub id: u8,
    pub name: String,
}

/// A compact view of a resource table for reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourcesSummary {
    pub packages: Vec<PackageSummary>,
    /// Number of resource ids per type name.
    pub types: BTreeMap<String, usize>,
    pub total_entries: usize,
    /// Default configuration string values, keyed by `package:type/key`.
    pub strings: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::TableBuilder;

    fn fr() -> Config {
        Config::from_locale("fr").unwrap()
    }

    fn builder() -> TableBuilder {
        let mut builder = TableBuilder::new(0x7f, "com.example");
        builder
            .entry("string", "hello", Config::default(), Value::String("Hello".to_string()))
            .entry("string", "hello", fr(), Value::String("Bonjour".to_string()))
            .entry("string", "app_name", Config::default(), Value::String("Demo".to_string()))
            .entry("color", "accent", Config::default(), Value::ColorArgb8(0xff00_ff00))
            .entry("string", "alias", Config::default(), Value::Reference(0x7f01_0000));
        builder
    }

    #[test]
    fn ids() {
        let id = ResourceId::new(0x7f, 0x04, 0x0001);
        assert_eq!(id.0, 0x7f04_0001);
        assert_eq!((id.package(), id.typ(), id.entry()), (0x7f, 4, 1));
        assert_eq!(id.to_string(), "0x7f040001");
    }

    #[test]
    fn locale_resolution() {
        for sparse in [false, true] {
            let table = ResourceTable::parse(&builder().sparse(sparse).build()).unwrap();
            let hello = table.find("string", "hello").unwrap();
            assert_eq!(hello, ResourceId(0x7f01_0000));

            let value = |request: &Config| table.resolve(hello, request).unwrap().value.clone();
            assert_eq!(
                value(&fr()),
                EntryValue::Simple(Value::String("Bonjour".to_string()))
            );
            assert_eq!(
                value(&Config::from_locale("de").unwrap()),
                EntryValue::Simple(Value::String("Hello".to_string()))
            );
            assert_eq!(
                value(&Config::default()),
                EntryValue::Simple(Value::String("Hello".to_string()))
            );
        }
    }

    #[test]
    fn only_conflicting_configurations() {
        let mut builder = TableBuilder::new(0x7f, "com.example");
        builder
            .entry("string", "only", Config::from_locale("it").unwrap(), Value::IntDec(1))
            .entry("string", "only", Config::from_locale("es").unwrap(), Value::IntDec(2));
        let table = ResourceTable::parse(&builder.build()).unwrap();
        let id = table.find("string", "only").unwrap();
        let entry = table.resolve(id, &fr()).unwrap();
        assert_eq!(entry.config.language.as_deref(), Some("es"));
    }

    #[test]
    fn missing_resource() {
        let table = ResourceTable::parse(&builder().build()).unwrap();
        assert_eq!(
            table.resolve(ResourceId(0x7f09_0009), &fr()).unwrap_err(),
            ResourcesError::ResourceNotFound(0x7f09_0009)
        );
    }

    #[test]
    fn references_are_followed() {
        let table = ResourceTable::parse(&builder().build()).unwrap();
        let alias = table.find("string", "alias").unwrap();
        assert_eq!(
            table.resolve_value(alias, &fr()).unwrap(),
            Value::String("Bonjour".to_string())
        );

        let mut looping = TableBuilder::new(0x7f, "loop");
        looping.entry("string", "a", Config::default(), Value::Reference(0x7f01_0000));
        let table = ResourceTable::parse(&looping.build()).unwrap();
        assert_eq!(
            table.resolve_value(ResourceId(0x7f01_0000), &Config::default()),
            Err(ResourcesError::ReferenceLoop(0x7f01_0000))
        );
    }

    #[test]
    fn complex_entries_are_kept() {
        let mut builder = builder();
        builder.complex(
            "style",
            "AppTheme",
            0x0103_0005,
            vec![(0x0101_0098, Value::ColorRgb8(0xff11_2233))],
        );
        let table = ResourceTable::parse(&builder.build()).unwrap();
        let theme = table.find("style", "AppTheme").unwrap();
        match &table.resolve(theme, &Config::default()).unwrap().value {
            EntryValue::Complex(complex) => {
                assert_eq!(complex.parent, 0x0103_0005);
                assert_eq!(complex.count, 1);
                assert_eq!(complex.blob.len(), 12);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            table.resolve_value(theme, &Config::default()).unwrap(),
            Value::Reference(theme.0)
        );
    }

    #[test]
    fn summary_and_dump() {
        let table = ResourceTable::parse(&builder().build()).unwrap();
        let summary = table.summary();
        assert_eq!(summary.packages[0].name, "com.example");
        assert_eq!(summary.total_entries, 4);
        assert_eq!(summary.types["string"], 3);
        assert_eq!(summary.types["color"], 1);
        assert_eq!(summary.strings["com.example:string/app_name"], "Demo");
        assert!(!summary.strings.contains_key("com.example:string/alias"));

        let dump = table.to_string();
        assert!(dump.contains("0x7f010001 string/app_name [default] \"Demo\""));
        assert!(dump.contains("0x7f010000 string/hello [fr] \"Bonjour\""));
    }

    #[test]
    fn truncated_table() {
        let bytes = builder().build();
        assert!(matches!(
            ResourceTable::parse(&bytes[..bytes.len() / 2]),
            Err(ResourcesError::MalformedResourceTable(_))
        ));
        assert!(ResourceTable::parse(&[]).is_err());
    }
}
