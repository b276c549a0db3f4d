//! Encoders producing binary XML documents and resource tables.
//!
//! They only cover what the decoders read back and are meant to build
//! synthetic inputs for tests.

use crate::chunk::{ChunkType, CHUNK_HEADER_SIZE};
use crate::config::{pack_locale_part, Config};
use crate::parsers::{
    ATTRIBUTE_SIZE, ENTRY_FLAG_COMPLEX, FLAG_SPARSE, STRING_POOL_HEADER_SIZE, TABLE_HEADER_SIZE,
};
use crate::strings::UTF8_FLAG;
use crate::values::Value;
use crate::xml::XmlNode;
use std::collections::BTreeMap;

const NO_INDEX: u32 = u32::MAX;
const PACKAGE_HEADER_SIZE: usize = 0x11c;
const CONFIG_SIZE: u32 = 52;
const TYPE_HEADER_SIZE: usize = 20 + CONFIG_SIZE as usize;

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// Wraps `body` in a chunk whose header is `header` extra bytes long.
fn chunk(typ: ChunkType, header: &[u8], body: &[u8]) -> Vec<u8> {
    let header_size = CHUNK_HEADER_SIZE + header.len();
    let mut out = Vec::with_capacity(header_size + body.len());
    push_u16(&mut out, typ.tag());
    push_u16(&mut out, header_size as u16);
    push_u32(&mut out, (header_size + body.len()) as u32);
    out.extend_from_slice(header);
    out.extend_from_slice(body);
    out
}

#[derive(Default)]
struct PoolBuilder {
    strings: Vec<String>,
    index: BTreeMap<String, u32>,
}

impl PoolBuilder {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(idx) = self.index.get(s) {
            return *idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    fn get(&self, s: &str) -> u32 {
        self.index.get(s).copied().unwrap_or(NO_INDEX)
    }

    fn opt(&self, s: Option<&str>) -> u32 {
        s.map_or(NO_INDEX, |s| self.get(s))
    }

    fn write(&self, utf8: bool) -> Vec<u8> {
        let mut offsets = Vec::new();
        let mut data = Vec::new();
        for s in &self.strings {
            push_u32(&mut offsets, data.len() as u32);
            if utf8 {
                let chars = s.encode_utf16().count();
                let bytes = s.len();
                for len in [chars, bytes] {
                    if len > 0x7f {
                        data.push(0x80 | (len >> 8) as u8);
                    }
                    data.push(len as u8);
                }
                data.extend_from_slice(s.as_bytes());
                data.push(0);
            } else {
                let units = s.encode_utf16().collect::<Vec<u16>>();
                if units.len() > 0x7fff {
                    push_u16(&mut data, 0x8000 | (units.len() >> 16) as u16);
                }
                push_u16(&mut data, units.len() as u16);
                for unit in units {
                    push_u16(&mut data, unit);
                }
                push_u16(&mut data, 0);
            }
        }
        pad4(&mut data);

        let mut header = Vec::new();
        push_u32(&mut header, self.strings.len() as u32);
        push_u32(&mut header, 0);
        push_u32(&mut header, if utf8 { UTF8_FLAG } else { 0 });
        push_u32(&mut header, (STRING_POOL_HEADER_SIZE + offsets.len()) as u32);
        push_u32(&mut header, 0);

        let mut body = offsets;
        body.extend_from_slice(&data);
        chunk(ChunkType::StringPool, &header, &body)
    }
}

fn value_data(value: &Value, pool: &PoolBuilder) -> u32 {
    match value {
        Value::Null => 0,
        Value::String(s) => pool.get(s),
        Value::Float(v) => v.to_bits(),
        Value::IntDec(i) => *i as u32,
        Value::Boolean(b) => {
            if *b {
                u32::MAX
            } else {
                0
            }
        }
        Value::Reference(d)
        | Value::Attribute(d)
        | Value::Dimension(d)
        | Value::Fraction(d)
        | Value::IntHex(d)
        | Value::ColorArgb8(d)
        | Value::ColorRgb8(d)
        | Value::ColorArgb4(d)
        | Value::ColorRgb4(d) => *d,
    }
}

fn push_value(out: &mut Vec<u8>, value: &Value, pool: &PoolBuilder) {
    push_u16(out, 8);
    out.push(0);
    out.push(value.type_tag());
    push_u32(out, value_data(value, pool));
}

/// Binary XML encoder.
#[derive(Debug, Default)]
pub struct XmlWriter {
    utf8: bool,
}

impl XmlWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn utf8(self, utf8: bool) -> Self {
        Self { utf8 }
    }

    #[must_use]
    pub fn write(&self, root: &XmlNode) -> Vec<u8> {
        // attribute names carrying a resource id come first in the pool so
        // that the resource map indexes them
        let mut pool = PoolBuilder::default();
        let mut ids = Vec::new();
        collect_ids(root, &mut pool, &mut ids);
        collect_strings(root, &mut pool);

        let mut body = pool.write(self.utf8);
        if !ids.is_empty() {
            let mut map = Vec::new();
            for id in &ids {
                push_u32(&mut map, *id);
            }
            body.extend(chunk(ChunkType::XmlResourceMap, &[], &map));
        }
        write_element(root, &pool, &mut body);

        chunk(ChunkType::Xml, &[], &body)
    }
}

fn collect_ids(node: &XmlNode, pool: &mut PoolBuilder, ids: &mut Vec<u32>) {
    for attr in &node.attributes {
        if let Some(id) = attr.resource_id {
            if pool.get(&attr.name) == NO_INDEX {
                pool.intern(&attr.name);
                ids.push(id);
            }
        }
    }
    for child in &node.children {
        collect_ids(child, pool, ids);
    }
}

fn collect_strings(node: &XmlNode, pool: &mut PoolBuilder) {
    for ns in &node.namespaces {
        if let Some(prefix) = &ns.prefix {
            pool.intern(prefix);
        }
        pool.intern(&ns.uri);
    }
    if let Some(ns) = &node.namespace {
        pool.intern(ns);
    }
    pool.intern(&node.name);
    for attr in &node.attributes {
        if let Some(ns) = &attr.namespace {
            pool.intern(ns);
        }
        pool.intern(&attr.name);
        if let Some(raw) = &attr.raw {
            pool.intern(raw);
        }
        if let Value::String(s) = &attr.value {
            pool.intern(s);
        }
    }
    if let Some(text) = &node.text {
        pool.intern(text);
    }
    for child in &node.children {
        collect_strings(child, pool);
    }
}

fn node_header(line: u32) -> Vec<u8> {
    let mut header = Vec::new();
    push_u32(&mut header, line);
    push_u32(&mut header, NO_INDEX);
    header
}

fn write_element(node: &XmlNode, pool: &PoolBuilder, out: &mut Vec<u8>) {
    let header = node_header(node.line);

    for ns in &node.namespaces {
        let mut body = Vec::new();
        push_u32(&mut body, pool.opt(ns.prefix.as_deref()));
        push_u32(&mut body, pool.get(&ns.uri));
        out.extend(chunk(ChunkType::XmlStartNamespace, &header, &body));
    }

    let mut body = Vec::new();
    push_u32(&mut body, pool.opt(node.namespace.as_deref()));
    push_u32(&mut body, pool.get(&node.name));
    push_u16(&mut body, 0x14);
    push_u16(&mut body, ATTRIBUTE_SIZE as u16);
    push_u16(&mut body, node.attributes.len() as u16);
    push_u16(&mut body, 0);
    push_u16(&mut body, 0);
    push_u16(&mut body, 0);
    for attr in &node.attributes {
        push_u32(&mut body, pool.opt(attr.namespace.as_deref()));
        push_u32(&mut body, pool.get(&attr.name));
        push_u32(&mut body, pool.opt(attr.raw.as_deref()));
        push_value(&mut body, &attr.value, pool);
    }
    out.extend(chunk(ChunkType::XmlStartElement, &header, &body));

    if let Some(text) = &node.text {
        let mut body = Vec::new();
        push_u32(&mut body, pool.get(text));
        push_value(&mut body, &Value::Null, pool);
        out.extend(chunk(ChunkType::XmlCdata, &header, &body));
    }

    for child in &node.children {
        write_element(child, pool, out);
    }

    let mut body = Vec::new();
    push_u32(&mut body, pool.opt(node.namespace.as_deref()));
    push_u32(&mut body, pool.get(&node.name));
    out.extend(chunk(ChunkType::XmlEndElement, &header, &body));

    for ns in node.namespaces.iter().rev() {
        let mut body = Vec::new();
        push_u32(&mut body, pool.opt(ns.prefix.as_deref()));
        push_u32(&mut body, pool.get(&ns.uri));
        out.extend(chunk(ChunkType::XmlEndNamespace, &header, &body));
    }
}

enum BuiltValue {
    Simple(Value),
    Complex(u32, Vec<(u32, Value)>),
}

struct BuiltType {
    name: String,
    keys: Vec<String>,
    configs: BTreeMap<Config, BTreeMap<u16, BuiltValue>>,
}

/// Resource table encoder with a single package.
///
/// Type ids and entry indexes are assigned in insertion order, starting at
/// 1 and 0 respectively.
pub struct TableBuilder {
    id: u8,
    name: String,
    sparse: bool,
    types: Vec<BuiltType>,
}

impl TableBuilder {
    #[must_use]
    pub fn new(id: u8, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            sparse: false,
            types: Vec::new(),
        }
    }

    /// Writes type chunks with explicit index/offset pairs.
    pub fn sparse(&mut self, sparse: bool) -> &mut Self {
        self.sparse = sparse;
        self
    }

    fn slot(&mut self, type_name: &str, key: &str) -> (&mut BuiltType, u16) {
        let pos = match self.types.iter().position(|t| t.name == type_name) {
            Some(pos) => pos,
            None => {
                self.types.push(BuiltType {
                    name: type_name.to_string(),
                    keys: Vec::new(),
                    configs: BTreeMap::new(),
                });
                self.types.len() - 1
            }
        };
        let typ = &mut self.types[pos];
        let idx = match typ.keys.iter().position(|k| k == key) {
            Some(idx) => idx,
            None => {
                typ.keys.push(key.to_string());
                typ.keys.len() - 1
            }
        };
        (typ, idx as u16)
    }

    pub fn entry(&mut self, type_name: &str, key: &str, config: Config, value: Value) -> &mut Self {
        let (typ, idx) = self.slot(type_name, key);
        typ.configs
            .entry(config)
            .or_default()
            .insert(idx, BuiltValue::Simple(value));
        self
    }

    /// Adds a bag entry under the default configuration.
    pub fn complex(
        &mut self,
        type_name: &str,
        key: &str,
        parent: u32,
        items: Vec<(u32, Value)>,
    ) -> &mut Self {
        let (typ, idx) = self.slot(type_name, key);
        typ.configs
            .entry(Config::default())
            .or_default()
            .insert(idx, BuiltValue::Complex(parent, items));
        self
    }

    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut values = PoolBuilder::default();
        let mut type_names = PoolBuilder::default();
        let mut keys = PoolBuilder::default();
        for typ in &self.types {
            type_names.intern(&typ.name);
            for key in &typ.keys {
                keys.intern(key);
            }
            for entries in typ.configs.values() {
                for value in entries.values() {
                    match value {
                        BuiltValue::Simple(Value::String(s)) => {
                            values.intern(s);
                        }
                        BuiltValue::Complex(_, items) => {
                            for (_, item) in items {
                                if let Value::String(s) = item {
                                    values.intern(s);
                                }
                            }
                        }
                        BuiltValue::Simple(_) => (),
                    }
                }
            }
        }

        let type_pool = type_names.write(false);
        let key_pool = keys.write(false);

        let mut package_body = Vec::new();
        package_body.extend_from_slice(&type_pool);
        package_body.extend_from_slice(&key_pool);
        for (pos, typ) in self.types.iter().enumerate() {
            let type_id = (pos + 1) as u8;
            package_body.extend(self.type_spec(type_id, typ));
            for (config, entries) in &typ.configs {
                package_body.extend(self.type_chunk(type_id, typ, config, entries, &keys, &values));
            }
        }

        let mut package_header = Vec::new();
        push_u32(&mut package_header, u32::from(self.id));
        let mut name = self.name.encode_utf16().take(127).collect::<Vec<u16>>();
        name.resize(128, 0);
        for unit in name {
            push_u16(&mut package_header, unit);
        }
        push_u32(&mut package_header, PACKAGE_HEADER_SIZE as u32);
        push_u32(&mut package_header, 0);
        push_u32(&mut package_header, (PACKAGE_HEADER_SIZE + type_pool.len()) as u32);
        push_u32(&mut package_header, 0);
        let package = chunk(ChunkType::TablePackage, &package_header, &package_body);

        let mut body = values.write(true);
        body.extend(package);
        let mut header = Vec::new();
        push_u32(&mut header, 1);
        debug_assert_eq!(CHUNK_HEADER_SIZE + header.len(), TABLE_HEADER_SIZE);
        chunk(ChunkType::Table, &header, &body)
    }

    fn type_spec(&self, type_id: u8, typ: &BuiltType) -> Vec<u8> {
        let mut header = vec![type_id, 0];
        push_u16(&mut header, 0);
        push_u32(&mut header, typ.keys.len() as u32);
        let mut body = Vec::new();
        for _ in &typ.keys {
            push_u32(&mut body, 0);
        }
        chunk(ChunkType::TableTypeSpec, &header, &body)
    }

    fn type_chunk(
        &self,
        type_id: u8,
        typ: &BuiltType,
        config: &Config,
        entries: &BTreeMap<u16, BuiltValue>,
        keys: &PoolBuilder,
        values: &PoolBuilder,
    ) -> Vec<u8> {
        let mut data = Vec::new();
        let mut offsets = BTreeMap::new();
        for (idx, value) in entries {
            offsets.insert(*idx, data.len() as u32);
            let key = keys.get(&typ.keys[usize::from(*idx)]);
            match value {
                BuiltValue::Simple(value) => {
                    push_u16(&mut data, 8);
                    push_u16(&mut data, 0);
                    push_u32(&mut data, key);
                    push_value(&mut data, value, values);
                }
                BuiltValue::Complex(parent, items) => {
                    push_u16(&mut data, 16);
                    push_u16(&mut data, ENTRY_FLAG_COMPLEX);
                    push_u32(&mut data, key);
                    push_u32(&mut data, *parent);
                    push_u32(&mut data, items.len() as u32);
                    for (name, item) in items {
                        push_u32(&mut data, *name);
                        push_value(&mut data, item, values);
                    }
                }
            }
        }

        let mut table = Vec::new();
        let entry_count = if self.sparse {
            for (idx, offset) in &offsets {
                push_u16(&mut table, *idx);
                push_u16(&mut table, (*offset / 4) as u16);
            }
            offsets.len()
        } else {
            for idx in 0..typ.keys.len() {
                push_u32(&mut table, offsets.get(&(idx as u16)).copied().unwrap_or(NO_INDEX));
            }
            typ.keys.len()
        };

        let mut header = vec![type_id, if self.sparse { FLAG_SPARSE } else { 0 }];
        push_u16(&mut header, 0);
        push_u32(&mut header, entry_count as u32);
        push_u32(&mut header, (TYPE_HEADER_SIZE + table.len()) as u32);
        header.extend(write_config(config));
        debug_assert_eq!(CHUNK_HEADER_SIZE + header.len(), TYPE_HEADER_SIZE);

        table.extend(data);
        chunk(ChunkType::TableType, &header, &table)
    }
}

fn write_config(config: &Config) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, CONFIG_SIZE);
    push_u16(&mut out, config.mcc.unwrap_or(0));
    push_u16(&mut out, config.mnc.unwrap_or(0));
    out.extend(pack_locale_part(config.language.as_deref(), b'a'));
    out.extend(pack_locale_part(config.region.as_deref(), b'0'));
    out.push(config.orientation.unwrap_or(0));
    out.push(config.touchscreen.unwrap_or(0));
    push_u16(&mut out, config.density.unwrap_or(0));
    out.push(config.keyboard.unwrap_or(0));
    out.push(config.navigation.unwrap_or(0));
    out.push(config.input_flags.unwrap_or(0));
    out.push(0);
    push_u16(&mut out, config.screen_width.unwrap_or(0));
    push_u16(&mut out, config.screen_height.unwrap_or(0));
    push_u16(&mut out, config.sdk_version.unwrap_or(0));
    push_u16(&mut out, 0);
    out.push(config.screen_layout.unwrap_or(0));
    out.push(config.ui_mode.unwrap_or(0));
    push_u16(&mut out, config.smallest_width_dp.unwrap_or(0));
    push_u16(&mut out, config.screen_width_dp.unwrap_or(0));
    push_u16(&mut out, config.screen_height_dp.unwrap_or(0));
    let mut script = config.script.clone().unwrap_or_default().into_bytes();
    script.resize(4, 0);
    out.extend(script);
    let mut variant = config.variant.clone().unwrap_or_default().into_bytes();
    variant.resize(8, 0);
    out.extend(variant);
    out.push(config.screen_layout2.unwrap_or(0));
    out.push(config.color_mode.unwrap_or(0));
    push_u16(&mut out, 0);
    out
}
