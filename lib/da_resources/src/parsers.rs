use crate::chunk::{ChunkHeader, ChunkType, CHUNK_HEADER_SIZE};
use crate::config::{unpack_locale_part, Config};
use crate::errors::{ResourcesError, ResourcesResult};
use crate::strings::{decode_entry, StringPool, SORTED_FLAG, UTF8_FLAG};
use crate::table::{ComplexEntry, EntryValue, ResourceId, ResourceTable, TableEntry, TablePackage};
use crate::values::Value;
use crate::xml::{Namespace, XmlAttribute, XmlNode};
use nom::bytes::complete::take;
use nom::combinator::map;
use nom::error::{ErrorKind, ParseError};
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::sequence::tuple;
use nom::Err::Error;
use nom::{Finish, IResult};
use std::collections::BTreeMap;

pub(crate) const STRING_POOL_HEADER_SIZE: usize = 0x1c;
pub(crate) const TABLE_HEADER_SIZE: usize = 0x0c;
pub(crate) const ATTRIBUTE_SIZE: usize = 0x14;

pub(crate) const FLAG_SPARSE: u8 = 0x01;
pub(crate) const FLAG_OFFSET16: u8 = 0x02;

pub(crate) const ENTRY_FLAG_COMPLEX: u16 = 0x0001;
pub(crate) const ENTRY_FLAG_COMPACT: u16 = 0x0008;

const NO_ENTRY: u32 = 0xffff_ffff;
const NO_ENTRY16: u16 = 0xffff;

pub(crate) fn chunk_header_parser(input: &[u8]) -> IResult<&[u8], ChunkHeader, ResourcesError> {
    let (input, typ) = map(le_u16, ChunkType::from)(input)?;
    let (input, header_size) = le_u16(input)?;
    let (input, chunk_size) = le_u32(input)?;

    Ok((
        input,
        ChunkHeader {
            typ,
            header_size: header_size as usize,
            chunk_size: chunk_size as usize,
        },
    ))
}

/// Cuts the chunk starting at `input`, checking its declared sizes against
/// the remaining buffer.
pub(crate) fn split_chunk(input: &[u8]) -> ResourcesResult<(ChunkHeader, &[u8])> {
    let (_, header) = chunk_header_parser(input).finish()?;
    if header.header_size < CHUNK_HEADER_SIZE || header.chunk_size < header.header_size {
        return Err(ResourcesError::InvalidChunk(format!(
            "{} chunk has inconsistent sizes (header {}, chunk {})",
            header.typ, header.header_size, header.chunk_size
        )));
    }
    if header.chunk_size > input.len() {
        return Err(ResourcesError::ChunkOverflow {
            chunk: header.typ,
            declared: header.chunk_size,
            available: input.len(),
        });
    }
    Ok((header, &input[..header.chunk_size]))
}

/// Iterator over the consecutive chunks of a buffer. It stops after the
/// first chunk that cannot be split off.
pub(crate) struct Chunks<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Chunks<'a> {
    pub(crate) fn new(data: &'a [u8], start: usize) -> Self {
        Self {
            data,
            offset: start,
            failed: false,
        }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = (usize, ResourcesResult<(ChunkHeader, &'a [u8])>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }
        let offset = self.offset;
        match split_chunk(&self.data[offset..]) {
            Ok((header, chunk)) => {
                self.offset += header.chunk_size;
                Some((offset, Ok((header, chunk))))
            }
            Err(err) => {
                self.failed = true;
                Some((offset, Err(err)))
            }
        }
    }
}

fn invalid<'a, T>(msg: String) -> IResult<&'a [u8], T, ResourcesError> {
    Err(Error(ResourcesError::InvalidChunk(msg)))
}

/// Checks that `n` items of `size` bytes fit in `input`, so that no
/// allocation is driven by an unchecked count.
fn check_room(input: &[u8], n: usize, size: usize, what: &str) -> Result<(), nom::Err<ResourcesError>> {
    match n.checked_mul(size) {
        Some(needed) if needed <= input.len() => Ok(()),
        _ => Err(Error(ResourcesError::InvalidChunk(format!(
            "{n} {what} do not fit in {} bytes",
            input.len()
        )))),
    }
}

pub(crate) fn string_pool_parser(chunk: &[u8]) -> IResult<&[u8], StringPool, ResourcesError> {
    log::debug!(">> string_pool_parser");

    let (input, header) = chunk_header_parser(chunk)?;
    if header.typ != ChunkType::StringPool || header.header_size < STRING_POOL_HEADER_SIZE {
        return invalid(format!(
            "unexpected {} chunk with header size {} for a string pool",
            header.typ, header.header_size
        ));
    }

    let (input, string_count) = le_u32(input)?;
    let (input, style_count) = le_u32(input)?;
    let (input, flags) = le_u32(input)?;
    let (input, strings_start) = le_u32(input)?;
    let (_, styles_start) = le_u32(input)?;

    log::debug!("string_pool::string_count = {}", string_count);
    log::debug!("string_pool::style_count = {}", style_count);
    log::debug!("string_pool::flags = {:#x}", flags);
    log::debug!("string_pool::strings_start = {:#x}", strings_start);
    log::debug!("string_pool::styles_start = {:#x}", styles_start);

    let utf8 = flags & UTF8_FLAG != 0;
    let sorted = flags & SORTED_FLAG != 0;

    let offsets_area = &chunk[header.header_size.min(chunk.len())..];
    check_room(offsets_area, string_count as usize, 4, "string offsets")?;
    let (_, offsets) = count(le_u32, string_count as usize)(offsets_area)?;

    let mut strings = Vec::with_capacity(offsets.len());
    for (idx, offset) in offsets.into_iter().enumerate() {
        let start = strings_start as usize + offset as usize;
        match chunk.get(start..).and_then(|data| decode_entry(data, utf8)) {
            Some(string) => strings.push(string),
            None => {
                return invalid(format!("string #{idx} at {start:#x} overflows its pool"));
            }
        }
    }

    log::debug!("<< string_pool_parser");

    Ok((
        &chunk[chunk.len()..],
        StringPool {
            sorted,
            utf8,
            strings,
        },
    ))
}

pub(crate) fn xml_resource_map_parser(chunk: &[u8]) -> IResult<&[u8], Vec<u32>, ResourcesError> {
    log::debug!(">> xml_resource_map_parser");

    let (_, header) = chunk_header_parser(chunk)?;
    let body = &chunk[header.header_size.min(chunk.len())..];
    let (input, ids) = count(le_u32, body.len() / 4)(body)?;

    log::debug!("<< xml_resource_map_parser");

    Ok((input, ids))
}

pub(crate) fn xml_namespace_parser<'a>(
    chunk: &'a [u8],
    pool: &StringPool,
) -> IResult<&'a [u8], Namespace, ResourcesError> {
    log::debug!(">> xml_namespace_parser");

    let (_, header) = chunk_header_parser(chunk)?;
    let body = &chunk[header.header_size.min(chunk.len())..];
    let (input, prefix) = le_u32(body)?;
    let (input, uri) = le_u32(input)?;

    let prefix = pool.get_opt(prefix).map_err(Error)?.map(str::to_string);
    let uri = pool.get(uri).map_err(Error)?.to_string();

    log::debug!("<< xml_namespace_parser");

    Ok((input, Namespace { prefix, uri }))
}

fn xml_line_parser(input: &[u8]) -> IResult<&[u8], u32, ResourcesError> {
    let (input, (line, _comment)) = tuple((le_u32, le_u32))(input)?;
    Ok((input, line))
}

pub(crate) fn xml_start_element_parser<'a>(
    chunk: &'a [u8],
    pool: &StringPool,
    resource_map: &[u32],
) -> IResult<&'a [u8], XmlNode, ResourcesError> {
    log::debug!(">> xml_start_element_parser");

    let (input, header) = chunk_header_parser(chunk)?;
    let (_, line) = xml_line_parser(input)?;

    let body = &chunk[header.header_size.min(chunk.len())..];
    let (input, ns) = le_u32(body)?;
    let (input, name) = le_u32(input)?;
    let (input, attr_start) = le_u16(input)?;
    let (input, attr_size) = le_u16(input)?;
    let (_, attr_count) = le_u16(input)?;

    let attr_size = attr_size as usize;
    if attr_size < ATTRIBUTE_SIZE {
        return invalid(format!("attribute size {attr_size} is too small"));
    }
    let attrs_area = &body[(attr_start as usize).min(body.len())..];
    check_room(attrs_area, attr_count as usize, attr_size, "attributes")?;

    let mut attributes = Vec::with_capacity(attr_count as usize);
    for raw in attrs_area.chunks(attr_size).take(attr_count as usize) {
        let (_, attribute) = xml_attribute_parser(raw, pool, resource_map)?;
        attributes.push(attribute);
    }

    let node = XmlNode {
        namespace: pool.get_opt(ns).map_err(Error)?.map(str::to_string),
        name: pool.get(name).map_err(Error)?.to_string(),
        line,
        namespaces: Vec::new(),
        attributes,
        text: None,
        children: Vec::new(),
    };

    log::debug!("<< xml_start_element_parser");

    Ok((&chunk[chunk.len()..], node))
}

fn xml_attribute_parser<'a>(
    input: &'a [u8],
    pool: &StringPool,
    resource_map: &[u32],
) -> IResult<&'a [u8], XmlAttribute, ResourcesError> {
    let (input, ns) = le_u32(input)?;
    let (input, name) = le_u32(input)?;
    let (input, raw) = le_u32(input)?;
    let (input, value) = value_parser(input, pool)?;

    Ok((
        input,
        XmlAttribute {
            namespace: pool.get_opt(ns).map_err(Error)?.map(str::to_string),
            name: pool.get(name).map_err(Error)?.to_string(),
            resource_id: resource_map.get(name as usize).copied(),
            raw: pool.get_opt(raw).map_err(Error)?.map(str::to_string),
            value,
        },
    ))
}

/// Parses an end element chunk, returning the closed element name.
pub(crate) fn xml_end_element_parser<'a>(
    chunk: &'a [u8],
    pool: &StringPool,
) -> IResult<&'a [u8], String, ResourcesError> {
    let (_, header) = chunk_header_parser(chunk)?;
    let body = &chunk[header.header_size.min(chunk.len())..];
    let (input, _ns) = le_u32(body)?;
    let (input, name) = le_u32(input)?;
    Ok((input, pool.get(name).map_err(Error)?.to_string()))
}

pub(crate) fn xml_cdata_parser<'a>(
    chunk: &'a [u8],
    pool: &StringPool,
) -> IResult<&'a [u8], String, ResourcesError> {
    let (_, header) = chunk_header_parser(chunk)?;
    let body = &chunk[header.header_size.min(chunk.len())..];
    let (input, data) = le_u32(body)?;
    let (input, _value) = value_parser(input, pool)?;
    Ok((input, pool.get(data).map_err(Error)?.to_string()))
}

pub(crate) fn value_parser<'a>(
    input: &'a [u8],
    pool: &StringPool,
) -> IResult<&'a [u8], Value, ResourcesError> {
    let (input, _size) = le_u16(input)?;
    let (input, _res0) = le_u8(input)?;
    let (input, typ) = le_u8(input)?;
    let (input, data) = le_u32(input)?;

    log::trace!("value::typ = {:#x}, value::data = {:#x}", typ, data);

    let value = Value::decode(typ, data, pool).map_err(Error)?;
    Ok((input, value))
}

fn non_zero<T: Default + PartialEq>(value: T) -> Option<T> {
    (value != T::default()).then_some(value)
}

fn ascii_field(raw: &[u8]) -> Option<String> {
    let s: String = raw
        .iter()
        .take_while(|b| **b != 0)
        .map(|b| char::from(*b))
        .collect();
    non_zero(s)
}

const CONFIG_FIELDS_SIZE: usize = 48;

/// Parses a size-prefixed `ResTable_config`. Older, shorter configurations
/// are zero-extended, a zero field meaning "unset".
pub(crate) fn config_parser(input: &[u8]) -> IResult<&[u8], Config, ResourcesError> {
    let (input, size) = le_u32(input)?;
    let (input, raw) = take((size as usize).saturating_sub(4))(input)?;

    let mut buf = raw.to_vec();
    if buf.len() < CONFIG_FIELDS_SIZE {
        buf.resize(CONFIG_FIELDS_SIZE, 0);
    }
    let (_, config) = config_fields_parser(&buf)?;

    Ok((input, config))
}

fn config_fields_parser(input: &[u8]) -> IResult<&[u8], Config, ResourcesError> {
    let (input, mcc) = map(le_u16, non_zero)(input)?;
    let (input, mnc) = map(le_u16, non_zero)(input)?;
    let (input, language) = take(2usize)(input)?;
    let (input, region) = take(2usize)(input)?;
    let (input, orientation) = map(le_u8, non_zero)(input)?;
    let (input, touchscreen) = map(le_u8, non_zero)(input)?;
    let (input, density) = map(le_u16, non_zero)(input)?;
    let (input, keyboard) = map(le_u8, non_zero)(input)?;
    let (input, navigation) = map(le_u8, non_zero)(input)?;
    let (input, input_flags) = map(le_u8, non_zero)(input)?;
    let (input, _pad0) = le_u8(input)?;
    let (input, screen_width) = map(le_u16, non_zero)(input)?;
    let (input, screen_height) = map(le_u16, non_zero)(input)?;
    let (input, sdk_version) = map(le_u16, non_zero)(input)?;
    let (input, _minor_version) = le_u16(input)?;
    let (input, screen_layout) = map(le_u8, non_zero)(input)?;
    let (input, ui_mode) = map(le_u8, non_zero)(input)?;
    let (input, smallest_width_dp) = map(le_u16, non_zero)(input)?;
    let (input, screen_width_dp) = map(le_u16, non_zero)(input)?;
    let (input, screen_height_dp) = map(le_u16, non_zero)(input)?;
    let (input, script) = take(4usize)(input)?;
    let (input, variant) = take(8usize)(input)?;
    let (input, screen_layout2) = map(le_u8, non_zero)(input)?;
    let (input, color_mode) = map(le_u8, non_zero)(input)?;
    let (input, _pad2) = le_u16(input)?;

    Ok((
        input,
        Config {
            mcc,
            mnc,
            language: unpack_locale_part([language[0], language[1]], b'a'),
            region: unpack_locale_part([region[0], region[1]], b'0'),
            orientation,
            touchscreen,
            density,
            keyboard,
            navigation,
            input_flags,
            screen_width,
            screen_height,
            sdk_version,
            screen_layout,
            ui_mode,
            smallest_width_dp,
            screen_width_dp,
            screen_height_dp,
            script: ascii_field(script),
            variant: ascii_field(variant),
            screen_layout2,
            color_mode,
        },
    ))
}

fn table_error(err: ResourcesError) -> ResourcesError {
    match err {
        ResourcesError::MalformedResourceTable(_) => err,
        other => ResourcesError::MalformedResourceTable(other.to_string()),
    }
}

pub(crate) fn table_parser(input: &[u8]) -> ResourcesResult<ResourceTable> {
    log::debug!(">> table_parser");

    let (header, chunk) = split_chunk(input).map_err(table_error)?;
    if header.typ != ChunkType::Table || header.header_size < TABLE_HEADER_SIZE {
        return Err(ResourcesError::MalformedResourceTable(format!(
            "unexpected {} root chunk",
            header.typ
        )));
    }
    let (_, package_count) = le_u32::<_, ResourcesError>(&chunk[CHUNK_HEADER_SIZE..])
        .finish()
        .map_err(table_error)?;
    log::debug!("table::package_count = {}", package_count);

    let mut table = ResourceTable::default();
    let mut global_pool = None;

    for (offset, next) in Chunks::new(chunk, header.header_size) {
        let (child, data) = next.map_err(table_error)?;
        match child.typ {
            ChunkType::StringPool if global_pool.is_none() => {
                let (_, pool) = string_pool_parser(data).finish().map_err(table_error)?;
                global_pool = Some(pool);
            }
            ChunkType::TablePackage => {
                let pool = global_pool.as_ref().ok_or_else(|| {
                    ResourcesError::MalformedResourceTable(
                        "package chunk before the global string pool".to_string(),
                    )
                })?;
                table_package_parser(data, pool, &mut table)?;
            }
            other => log::warn!("skipping {} chunk at {:#x}", other, offset),
        }
    }

    if table.packages.len() != package_count as usize {
        log::warn!(
            "table declares {} packages, {} found",
            package_count,
            table.packages.len()
        );
    }
    table.strings = global_pool.unwrap_or_default();

    log::debug!("<< table_parser");

    Ok(table)
}

fn table_package_header_parser(
    input: &[u8],
) -> IResult<&[u8], (ChunkHeader, u32, String, u32, u32), ResourcesError> {
    let (input, header) = chunk_header_parser(input)?;
    let (input, id) = le_u32(input)?;
    let (input, name_raw) = count(le_u16, 128)(input)?;
    let first_zero = name_raw.partition_point(|c| *c != 0);
    let name = String::from_utf16_lossy(&name_raw[..first_zero]);
    let (input, type_strings) = le_u32(input)?;
    let (input, _last_public_type) = le_u32(input)?;
    let (input, key_strings) = le_u32(input)?;
    let (input, _last_public_key) = le_u32(input)?;
    Ok((input, (header, id, name, type_strings, key_strings)))
}

fn package_pool(chunk: &[u8], offset: u32) -> ResourcesResult<StringPool> {
    let data = chunk.get(offset as usize..).ok_or_else(|| {
        ResourcesError::MalformedResourceTable(format!("string pool offset {offset:#x} overflows"))
    })?;
    let (_, pool_chunk) = split_chunk(data)?;
    let (_, pool) = string_pool_parser(pool_chunk).finish()?;
    Ok(pool)
}

fn table_package_parser(
    chunk: &[u8],
    pool: &StringPool,
    table: &mut ResourceTable,
) -> ResourcesResult<()> {
    log::debug!(">> table_package_parser");

    let (_, (header, id, name, type_strings, key_strings)) =
        table_package_header_parser(chunk).finish().map_err(table_error)?;
    let id = u8::try_from(id).map_err(|_| {
        ResourcesError::MalformedResourceTable(format!("package id {id:#x} is not a byte"))
    })?;

    log::debug!("package::id = {:#x}", id);
    log::debug!("package::name = {}", name);

    let mut package = TablePackage {
        id,
        name,
        type_strings: package_pool(chunk, type_strings).map_err(table_error)?,
        key_strings: package_pool(chunk, key_strings).map_err(table_error)?,
        type_specs: BTreeMap::new(),
    };

    for (offset, next) in Chunks::new(chunk, header.header_size) {
        let (child, data) = match next {
            Ok(next) => next,
            Err(err) => {
                table.warnings.push(ResourcesError::MalformedResourceTable(format!(
                    "package {}: chunk at {offset:#x}: {err}",
                    package.name
                )));
                break;
            }
        };
        match child.typ {
            ChunkType::StringPool => (),
            ChunkType::TableTypeSpec => match table_type_spec_parser(data).finish() {
                Ok((_, (type_id, entry_count))) => {
                    package.type_specs.insert(type_id, entry_count);
                }
                Err(err) => table.warnings.push(table_error(err)),
            },
            ChunkType::TableType => match table_type_parser(data, pool, &package).finish() {
                Ok((_, entries)) => {
                    for (id, entry) in entries {
                        table.insert(id, entry);
                    }
                }
                Err(err) => table.warnings.push(ResourcesError::MalformedResourceTable(
                    format!("package {}: type chunk at {offset:#x}: {err}", package.name),
                )),
            },
            other => log::debug!("skipping {} chunk in package {}", other, package.name),
        }
    }

    table.packages.push(package);

    log::debug!("<< table_package_parser");

    Ok(())
}

fn table_type_spec_parser(chunk: &[u8]) -> IResult<&[u8], (u8, u32), ResourcesError> {
    let (input, _header) = chunk_header_parser(chunk)?;
    let (input, id) = le_u8(input)?;
    let (input, _res0) = le_u8(input)?;
    let (input, _types_count) = le_u16(input)?;
    let (input, entry_count) = le_u32(input)?;

    log::debug!("type_spec::id = {:#x}", id);
    log::debug!("type_spec::entry_count = {}", entry_count);

    Ok((input, (id, entry_count)))
}

/// Returns the `(entry index, offset)` pairs of a type chunk, whatever its
/// offsets encoding.
fn type_offsets_parser(
    input: &[u8],
    flags: u8,
    entry_count: usize,
) -> IResult<&[u8], Vec<(u16, usize)>, ResourcesError> {
    if flags & FLAG_SPARSE != 0 {
        check_room(input, entry_count, 4, "sparse entries")?;
        let (input, pairs) = count(tuple((le_u16, le_u16)), entry_count)(input)?;
        let slots = pairs
            .into_iter()
            .map(|(idx, offset)| (idx, usize::from(offset) * 4))
            .collect();
        Ok((input, slots))
    } else if flags & FLAG_OFFSET16 != 0 {
        check_room(input, entry_count, 2, "entry offsets")?;
        let (input, offsets) = count(le_u16, entry_count)(input)?;
        let slots = offsets
            .into_iter()
            .zip(0..=u16::MAX)
            .filter(|(offset, _)| *offset != NO_ENTRY16)
            .map(|(offset, idx)| (idx, usize::from(offset) * 4))
            .collect();
        Ok((input, slots))
    } else {
        check_room(input, entry_count, 4, "entry offsets")?;
        let (input, offsets) = count(le_u32, entry_count)(input)?;
        let slots = offsets
            .into_iter()
            .zip(0..=u16::MAX)
            .filter(|(offset, _)| *offset != NO_ENTRY)
            .map(|(offset, idx)| (idx, offset as usize))
            .collect();
        Ok((input, slots))
    }
}

fn table_type_parser<'a>(
    chunk: &'a [u8],
    pool: &StringPool,
    package: &TablePackage,
) -> IResult<&'a [u8], Vec<(ResourceId, TableEntry)>, ResourcesError> {
    log::debug!(">> table_type_parser");

    let (input, header) = chunk_header_parser(chunk)?;
    let (input, type_id) = le_u8(input)?;
    let (input, flags) = le_u8(input)?;
    let (input, _reserved) = le_u16(input)?;
    let (input, entry_count) = le_u32(input)?;
    let (input, entries_start) = le_u32(input)?;
    let (_, config) = config_parser(input)?;

    log::debug!("type::id = {:#x}", type_id);
    log::debug!("type::flags = {:#x}", flags);
    log::debug!("type::entry_count = {}", entry_count);
    log::debug!("type::config = {}", config);

    if type_id == 0 {
        return invalid("type id 0 is reserved".to_string());
    }
    let type_name = package
        .type_strings
        .get(u32::from(type_id) - 1)
        .map_err(Error)?;

    if entry_count > u32::from(u16::MAX) + 1 {
        return invalid(format!("{entry_count} entries do not fit 16-bit indexes"));
    }
    let offsets_area = &chunk[header.header_size.min(chunk.len())..];
    let (_, slots) = type_offsets_parser(offsets_area, flags, entry_count as usize)?;

    let mut entries = Vec::with_capacity(slots.len());
    for (idx, offset) in slots {
        let start = entries_start as usize + offset;
        let Some(data) = chunk.get(start..) else {
            return invalid(format!("entry #{idx} at {start:#x} overflows its type chunk"));
        };
        let (_, (key, value)) = table_entry_parser(data, pool)?;
        let key = package.key_strings.get(key).map_err(Error)?;
        entries.push((
            ResourceId::new(package.id, type_id, idx),
            TableEntry {
                config: config.clone(),
                type_name: type_name.to_string(),
                key: key.to_string(),
                value,
            },
        ));
    }

    log::debug!("<< table_type_parser");

    Ok((&chunk[chunk.len()..], entries))
}

fn table_entry_parser<'a>(
    data: &'a [u8],
    pool: &StringPool,
) -> IResult<&'a [u8], (u32, EntryValue), ResourcesError> {
    let (input, size) = le_u16(data)?;
    let (input, flags) = le_u16(input)?;

    if flags & ENTRY_FLAG_COMPACT != 0 {
        // compact entries store the key in the size field and the value
        // type in the upper flags byte
        let (input, raw) = le_u32(input)?;
        let typ = (flags >> 8) as u8;
        let value = Value::decode(typ, raw, pool).map_err(Error)?;
        return Ok((input, (u32::from(size), EntryValue::Simple(value))));
    }

    let (input, key) = le_u32(input)?;
    let size = size as usize;

    if flags & ENTRY_FLAG_COMPLEX != 0 {
        let (input, parent) = le_u32(input)?;
        let (_, map_count) = le_u32(input)?;
        let maps = data.get(size.min(data.len())..).unwrap_or_default();
        check_room(maps, map_count as usize, 12, "map entries")?;
        let (input, blob) = take(map_count as usize * 12)(maps)?;
        Ok((
            input,
            (
                key,
                EntryValue::Complex(ComplexEntry {
                    parent,
                    count: map_count,
                    blob: blob.to_vec(),
                }),
            ),
        ))
    } else {
        let Some(raw_value) = data.get(size..) else {
            return Err(Error(ResourcesError::from_error_kind(
                input,
                ErrorKind::Eof,
            )));
        };
        let (input, value) = value_parser(raw_value, pool)?;
        Ok((input, (key, EntryValue::Simple(value))))
    }
}
