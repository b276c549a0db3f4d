//! Dex bytecode image loading.
//!
//! The header and the id tables must be sound or nothing is loaded. Past
//! that point the loader is tolerant: a class or method whose encoding is
//! broken is skipped and recorded as a warning.

use crate::code::{scan, CodeRef};
use crate::errors::{DexError, DexResult};
use crate::flags::AccessFlags;
use crate::model::{ClassDef, FieldDef, MethodDef, MethodRef};
use crate::mutf8;
use crate::types::{java_name, Type};
use da_utils::leb::uleb128;
use da_utils::CancelToken;
use nom::bytes::complete::{tag, take};
use nom::combinator::verify;
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::Err::Error;
use nom::{Finish, IResult};
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::convert::TryFrom;

pub(crate) const HEADER_SIZE: usize = 0x70;
pub(crate) const ENDIAN_CONSTANT: u32 = 0x1234_5678;
pub(crate) const NO_INDEX: u32 = 0xffff_ffff;

const STRING_ID_SIZE: usize = 4;
const TYPE_ID_SIZE: usize = 4;
const PROTO_ID_SIZE: usize = 12;
const FIELD_ID_SIZE: usize = 8;
const METHOD_ID_SIZE: usize = 8;
const CLASS_DEF_SIZE: usize = 32;
const CODE_ITEM_HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Section {
    size: usize,
    off: usize,
}

#[derive(Debug)]
struct Header {
    version: u32,
    checksum: u32,
    signature: Vec<u8>,
    file_size: usize,
    string_ids: Section,
    type_ids: Section,
    proto_ids: Section,
    field_ids: Section,
    method_ids: Section,
    class_defs: Section,
}

fn hexlify(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn section_parser(input: &[u8]) -> IResult<&[u8], Section, DexError> {
    let (input, size) = le_u32(input)?;
    let (input, off) = le_u32(input)?;
    Ok((
        input,
        Section {
            size: size as usize,
            off: off as usize,
        },
    ))
}

fn magic_parser(input: &[u8]) -> IResult<&[u8], u32, DexError> {
    let (input, _) = tag("dex\n")(input)?;
    let (input, digits) = verify(take(3usize), |ds: &[u8]| ds.iter().all(u8::is_ascii_digit))(input)?;
    let (input, _) = tag("\x00")(input)?;
    let version = digits
        .iter()
        .fold(0, |acc, d| acc * 10 + u32::from(d - b'0'));
    Ok((input, version))
}

fn header_parser(input: &[u8]) -> IResult<&[u8], Header, DexError> {
    let (input, version) = magic_parser(input)?;
    let (input, checksum) = le_u32(input)?;
    let (input, signature) = count(le_u8, 20)(input)?;
    let (input, file_size) = le_u32(input)?;
    let (input, _header_size) = verify(le_u32, |size| *size as usize == HEADER_SIZE)(input)?;
    let (input, _endian_tag) = verify(le_u32, |e| *e == ENDIAN_CONSTANT)(input)?;
    let (input, link) = section_parser(input)?;
    let (input, _map_off) = le_u32(input)?;
    let (input, string_ids) = section_parser(input)?;
    let (input, type_ids) = section_parser(input)?;
    let (input, proto_ids) = section_parser(input)?;
    let (input, field_ids) = section_parser(input)?;
    let (input, method_ids) = section_parser(input)?;
    let (input, class_defs) = section_parser(input)?;
    let (input, _data) = section_parser(input)?;

    if link.size != 0 {
        log::warn!("dex has a non-null link size");
    }

    Ok((
        input,
        Header {
            version,
            checksum,
            signature,
            file_size: file_size as usize,
            string_ids,
            type_ids,
            proto_ids,
            field_ids,
            method_ids,
            class_defs,
        },
    ))
}

/// Returns the bytes of an id table, failing when it lies outside of the
/// image.
fn table<'a>(input: &'a [u8], section: Section, item_size: usize, name: &str) -> DexResult<&'a [u8]> {
    if section.size == 0 {
        return Ok(&[]);
    }
    section
        .size
        .checked_mul(item_size)
        .and_then(|len| section.off.checked_add(len).map(|end| (section.off, end)))
        .and_then(|(start, end)| input.get(start..end))
        .ok_or_else(|| {
            DexError::MalformedImage(format!(
                "{name} table ({} items at {:#x}) is out of bounds",
                section.size, section.off
            ))
        })
}

fn string_data_parser(input: &[u8]) -> IResult<&[u8], String, DexError> {
    let (input, _utf16_size) = uleb128(input)?;
    let end = input
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| Error(DexError::InvalidMutf8("unterminated string".to_string())))?;
    let s = mutf8::decode(&input[..end]).map_err(Error)?;
    Ok((&input[end + 1..], s))
}

struct ProtoId {
    return_type: u32,
    parameters_off: u32,
}

struct MemberId {
    class_idx: u16,
    type_idx: u16,
    name_idx: u32,
}

fn member_id_parser(input: &[u8]) -> IResult<&[u8], MemberId, DexError> {
    let (input, class_idx) = le_u16(input)?;
    let (input, type_idx) = le_u16(input)?;
    let (input, name_idx) = le_u32(input)?;
    Ok((
        input,
        MemberId {
            class_idx,
            type_idx,
            name_idx,
        },
    ))
}

/// The decoded id tables, used to resolve indexes found in class data and
/// code.
struct Tables<'a> {
    input: &'a [u8],
    strings: Vec<Option<String>>,
    types: Vec<u32>,
    protos: Vec<ProtoId>,
    fields: Vec<MemberId>,
    methods: Vec<MemberId>,
}

impl<'a> Tables<'a> {
    fn parse(input: &'a [u8], header: &Header) -> DexResult<Self> {
        log::debug!(">> dex tables");

        let raw = table(input, header.string_ids, STRING_ID_SIZE, "string_ids")?;
        let mut malformed = 0;
        let strings = raw
            .chunks_exact(STRING_ID_SIZE)
            .map(|id| {
                let off = u32::from_le_bytes([id[0], id[1], id[2], id[3]]) as usize;
                let s = input
                    .get(off..)
                    .and_then(|data| string_data_parser(data).finish().ok())
                    .map(|(_, s)| s);
                if s.is_none() {
                    malformed += 1;
                }
                s
            })
            .collect::<Vec<_>>();
        if malformed > 0 {
            log::warn!("{} malformed strings in string table", malformed);
        }

        let raw = table(input, header.type_ids, TYPE_ID_SIZE, "type_ids")?;
        let types = raw
            .chunks_exact(TYPE_ID_SIZE)
            .map(|id| u32::from_le_bytes([id[0], id[1], id[2], id[3]]))
            .collect();

        let raw = table(input, header.proto_ids, PROTO_ID_SIZE, "proto_ids")?;
        let protos = raw
            .chunks_exact(PROTO_ID_SIZE)
            .map(|id| ProtoId {
                return_type: u32::from_le_bytes([id[4], id[5], id[6], id[7]]),
                parameters_off: u32::from_le_bytes([id[8], id[9], id[10], id[11]]),
            })
            .collect();

        let members = |raw: &[u8]| -> DexResult<Vec<MemberId>> {
            raw.chunks_exact(FIELD_ID_SIZE)
                .map(|id| Ok(member_id_parser(id).finish()?.1))
                .collect()
        };
        let fields = members(table(input, header.field_ids, FIELD_ID_SIZE, "field_ids")?)?;
        let methods = members(table(input, header.method_ids, METHOD_ID_SIZE, "method_ids")?)?;

        log::debug!("dex::strings = {}", strings.len());
        log::debug!("dex::methods = {}", methods.len());
        log::debug!("<< dex tables");

        Ok(Self {
            input,
            strings,
            types,
            protos,
            fields,
            methods,
        })
    }

    fn string(&self, idx: u32) -> DexResult<&str> {
        match self.strings.get(idx as usize) {
            Some(Some(s)) => Ok(s),
            Some(None) => Err(DexError::InvalidMutf8(format!("string #{idx} is malformed"))),
            None => Err(DexError::IndexOutOfBounds {
                table: "string_ids",
                index: idx,
            }),
        }
    }

    fn descriptor(&self, idx: u32) -> DexResult<&str> {
        let string_idx = self
            .types
            .get(idx as usize)
            .ok_or(DexError::IndexOutOfBounds {
                table: "type_ids",
                index: idx,
            })?;
        self.string(*string_idx)
    }

    fn type_name(&self, idx: u32) -> DexResult<String> {
        Ok(java_name(self.descriptor(idx)?))
    }

    fn type_list(&self, off: u32) -> DexResult<Vec<u32>> {
        if off == 0 {
            return Ok(Vec::new());
        }
        let data = self
            .input
            .get(off as usize..)
            .ok_or_else(|| DexError::InvalidOffset("type_list".to_string()))?;
        let (data, size) = le_u32::<_, DexError>(data).finish()?;
        if (size as usize).saturating_mul(2) > data.len() {
            return Err(DexError::InvalidOffset("type_list".to_string()));
        }
        let (_, list) = count(le_u16::<_, DexError>, size as usize)(data).finish()?;
        Ok(list.into_iter().map(u32::from).collect())
    }

    fn proto_descriptor(&self, idx: u32) -> DexResult<String> {
        let proto = self
            .protos
            .get(idx as usize)
            .ok_or(DexError::IndexOutOfBounds {
                table: "proto_ids",
                index: idx,
            })?;
        let mut descriptor = String::from("(");
        for param in self.type_list(proto.parameters_off)? {
            descriptor.push_str(self.descriptor(param)?);
        }
        descriptor.push(')');
        descriptor.push_str(self.descriptor(proto.return_type)?);
        Ok(descriptor)
    }

    fn method_ref(&self, idx: u32) -> DexResult<MethodRef> {
        let id = self
            .methods
            .get(idx as usize)
            .ok_or(DexError::IndexOutOfBounds {
                table: "method_ids",
                index: idx,
            })?;
        Ok(MethodRef {
            owner: self.type_name(u32::from(id.class_idx))?,
            name: self.string(id.name_idx)?.to_string(),
            descriptor: self.proto_descriptor(u32::from(id.type_idx))?,
        })
    }

    fn field(&self, idx: u32, flags: u32) -> DexResult<FieldDef> {
        let id = self.fields.get(idx as usize).ok_or(DexError::IndexOutOfBounds {
            table: "field_ids",
            index: idx,
        })?;
        Ok(FieldDef {
            name: self.string(id.name_idx)?.to_string(),
            typ: self.type_name(u32::from(id.type_idx))?,
            flags: AccessFlags::from_bits_truncate(flags),
        })
    }
}

struct RawClassDef {
    class_idx: u32,
    access_flags: u32,
    superclass_idx: u32,
    interfaces_off: u32,
    source_file_idx: u32,
    class_data_off: u32,
}

fn class_def_parser(input: &[u8]) -> IResult<&[u8], RawClassDef, DexError> {
    let (input, class_idx) = le_u32(input)?;
    let (input, access_flags) = le_u32(input)?;
    let (input, superclass_idx) = le_u32(input)?;
    let (input, interfaces_off) = le_u32(input)?;
    let (input, source_file_idx) = le_u32(input)?;
    let (input, _annotations_off) = le_u32(input)?;
    let (input, class_data_off) = le_u32(input)?;
    let (input, _static_values_off) = le_u32(input)?;
    Ok((
        input,
        RawClassDef {
            class_idx,
            access_flags,
            superclass_idx,
            interfaces_off,
            source_file_idx,
            class_data_off,
        },
    ))
}

struct EncodedMethod {
    method_idx: u32,
    access_flags: u32,
    code_off: u32,
}

#[derive(Default)]
struct ClassData {
    fields: Vec<(u32, u32)>,
    methods: Vec<EncodedMethod>,
}

fn encoded_fields_parser(mut input: &[u8], n: u32) -> IResult<&[u8], Vec<(u32, u32)>, DexError> {
    let mut fields = Vec::new();
    let mut idx = 0u32;
    for _ in 0..n {
        let (rest, diff) = uleb128(input)?;
        let (rest, flags) = uleb128(rest)?;
        idx = idx.wrapping_add(diff);
        fields.push((idx, flags));
        input = rest;
    }
    Ok((input, fields))
}

fn encoded_methods_parser(mut input: &[u8], n: u32) -> IResult<&[u8], Vec<EncodedMethod>, DexError> {
    let mut methods = Vec::new();
    let mut idx = 0u32;
    for _ in 0..n {
        let (rest, diff) = uleb128(input)?;
        let (rest, access_flags) = uleb128(rest)?;
        let (rest, code_off) = uleb128(rest)?;
        idx = idx.wrapping_add(diff);
        methods.push(EncodedMethod {
            method_idx: idx,
            access_flags,
            code_off,
        });
        input = rest;
    }
    Ok((input, methods))
}

fn class_data_parser(input: &[u8]) -> IResult<&[u8], ClassData, DexError> {
    let (input, static_fields) = uleb128(input)?;
    let (input, instance_fields) = uleb128(input)?;
    let (input, direct_methods) = uleb128(input)?;
    let (input, virtual_methods) = uleb128(input)?;

    // field and method indexes restart for each list
    let (input, mut fields) = encoded_fields_parser(input, static_fields)?;
    let (input, instance) = encoded_fields_parser(input, instance_fields)?;
    fields.extend(instance);
    let (input, mut methods) = encoded_methods_parser(input, direct_methods)?;
    let (input, virtuals) = encoded_methods_parser(input, virtual_methods)?;
    methods.extend(virtuals);

    Ok((input, ClassData { fields, methods }))
}

fn code_insns(input: &[u8], code_off: u32) -> DexResult<Vec<u16>> {
    let data = input
        .get(code_off as usize..)
        .filter(|data| data.len() >= CODE_ITEM_HEADER_SIZE)
        .ok_or_else(|| DexError::InvalidOffset("code_item".to_string()))?;
    let (_, insns_size) = le_u32::<_, DexError>(&data[12..]).finish()?;
    let raw = (insns_size as usize)
        .checked_mul(2)
        .and_then(|len| data.get(CODE_ITEM_HEADER_SIZE..CODE_ITEM_HEADER_SIZE + len))
        .ok_or_else(|| DexError::InvalidOffset("code_item instructions".to_string()))?;
    Ok(raw
        .chunks_exact(2)
        .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
        .collect())
}

fn method_parser(tables: &Tables, encoded: &EncodedMethod) -> DexResult<MethodDef> {
    let reference = tables.method_ref(encoded.method_idx)?;
    let mut method = MethodDef {
        reference,
        flags: AccessFlags::from_bits_truncate(encoded.access_flags),
        has_code: encoded.code_off != 0,
        invocations: Vec::new(),
        strings: BTreeSet::new(),
        types: BTreeSet::new(),
    };
    if encoded.code_off == 0 {
        return Ok(method);
    }

    let malformed = |err: DexError| DexError::MalformedMethod {
        method: method.reference.to_string(),
        reason: err.to_string(),
    };
    let insns = code_insns(tables.input, encoded.code_off).map_err(malformed)?;
    let refs = scan(&insns).map_err(malformed)?;

    let mut invocations = Vec::new();
    let mut strings = BTreeSet::new();
    let mut types = BTreeSet::new();
    for code_ref in refs {
        let resolved = match code_ref {
            CodeRef::Method(idx) => tables.method_ref(idx).map(|m| invocations.push(m)),
            CodeRef::String(idx) => tables.string(idx).map(|s| {
                strings.insert(s.to_string());
            }),
            CodeRef::Type(idx) => tables.descriptor(idx).map(|d| {
                if let Ok(t) = Type::try_from(d) {
                    if let Some(name) = t.class_name() {
                        types.insert(name);
                    }
                }
            }),
        };
        resolved.map_err(malformed)?;
    }
    method.invocations = invocations;
    method.strings = strings;
    method.types = types;
    Ok(method)
}

/// A loaded bytecode image.
#[derive(Debug)]
pub struct DexImage {
    version: u32,
    classes: Vec<ClassDef>,
    type_names: Vec<String>,
    method_ids: usize,
    warnings: Vec<DexError>,
    cancelled: bool,
}

impl DexImage {
    /// Loads a bytecode image.
    ///
    /// Fails with [`DexError::MalformedImage`] when the header or an id
    /// table cannot be read.
    pub fn parse(input: &[u8]) -> DexResult<Self> {
        Self::parse_with(input, &CancelToken::new())
    }

    /// Same as [`DexImage::parse`], checking `cancel` between classes.
    pub fn parse_with(input: &[u8], cancel: &CancelToken) -> DexResult<Self> {
        log::debug!(">> dex image");

        let (_, header) = header_parser(input)
            .finish()
            .map_err(|err| DexError::MalformedImage(format!("invalid header: {err}")))?;
        log::debug!("dex::version = {:03}", header.version);
        log::debug!("dex::file_size = {:#x}", header.file_size);

        let mut warnings = Vec::new();
        if header.file_size != input.len() {
            log::warn!(
                "dex declares {} bytes but {} are available",
                header.file_size,
                input.len()
            );
        }
        let end = header.file_size.clamp(HEADER_SIZE, input.len());

        let checksum = adler32::RollingAdler32::from_buffer(&input[12..end]).hash();
        if checksum != header.checksum {
            warnings.push(DexError::ChecksumMismatch {
                expected: format!("{:08x}", header.checksum),
                computed: format!("{checksum:08x}"),
            });
        }
        let signature = Sha1::digest(&input[32..end]);
        if signature.as_slice() != header.signature.as_slice() {
            warnings.push(DexError::ChecksumMismatch {
                expected: hexlify(&header.signature),
                computed: hexlify(&signature),
            });
        }

        let tables = Tables::parse(input, &header)?;
        let class_defs = table(input, header.class_defs, CLASS_DEF_SIZE, "class_defs")?;

        let mut classes = Vec::with_capacity(header.class_defs.size);
        let mut cancelled = false;
        for (i, raw) in class_defs.chunks_exact(CLASS_DEF_SIZE).enumerate() {
            if cancel.is_cancelled() {
                log::warn!("dex loading cancelled after {} classes", i);
                cancelled = true;
                break;
            }
            match class_parser(&tables, raw, &mut warnings) {
                Ok(class) => classes.push(class),
                Err((name, err)) => {
                    log::warn!("skipping class {}: {}", name, err);
                    warnings.push(DexError::MalformedClass {
                        class: name,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let type_names = (0..tables.types.len() as u32)
            .filter_map(|idx| tables.descriptor(idx).ok())
            .filter_map(|d| Type::try_from(d).ok())
            .filter_map(|t| t.class_name())
            .collect();

        log::debug!("<< dex image");

        Ok(Self {
            version: header.version,
            classes,
            type_names,
            method_ids: tables.methods.len(),
            warnings,
            cancelled,
        })
    }

    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn classes(&self) -> &[ClassDef] {
        &self.classes
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<ClassDef>, Vec<DexError>) {
        (self.classes, self.warnings)
    }

    /// Qualified names of every class type of the type table, defined by
    /// the image or not.
    #[must_use]
    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    /// Size of the method id table.
    #[must_use]
    pub const fn method_ids(&self) -> usize {
        self.method_ids
    }

    #[must_use]
    pub fn warnings(&self) -> &[DexError] {
        &self.warnings
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Decodes one class definition. On failure, returns the best name known
/// for the class along with the error.
fn class_parser(
    tables: &Tables,
    raw: &[u8],
    warnings: &mut Vec<DexError>,
) -> Result<ClassDef, (String, DexError)> {
    let (_, def) = class_def_parser(raw)
        .finish()
        .map_err(|err| ("?".to_string(), err))?;
    let name = tables
        .type_name(def.class_idx)
        .map_err(|err| (format!("#{}", def.class_idx), err))?;
    let fail = |err: DexError| (name.clone(), err);

    let superclass = if def.superclass_idx == NO_INDEX {
        None
    } else {
        Some(tables.type_name(def.superclass_idx).map_err(fail)?)
    };
    let interfaces = tables
        .type_list(def.interfaces_off)
        .map_err(fail)?
        .into_iter()
        .map(|idx| tables.type_name(idx))
        .collect::<DexResult<Vec<_>>>()
        .map_err(fail)?;
    let source_file = if def.source_file_idx == NO_INDEX {
        None
    } else {
        tables.string(def.source_file_idx).ok().map(str::to_string)
    };

    let data = if def.class_data_off == 0 {
        ClassData::default()
    } else {
        let input = tables
            .input
            .get(def.class_data_off as usize..)
            .ok_or_else(|| fail(DexError::InvalidOffset("class_data".to_string())))?;
        class_data_parser(input).finish().map_err(fail)?.1
    };

    let fields = data
        .fields
        .iter()
        .map(|(idx, flags)| tables.field(*idx, *flags))
        .collect::<DexResult<Vec<_>>>()
        .map_err(fail)?;

    let mut methods = Vec::with_capacity(data.methods.len());
    for encoded in &data.methods {
        match method_parser(tables, encoded) {
            Ok(method) => methods.push(method),
            Err(err @ DexError::MalformedMethod { .. }) => {
                log::warn!("{}", err);
                warnings.push(err);
            }
            Err(err) => return Err(fail(err)),
        }
    }

    Ok(ClassDef {
        name,
        superclass,
        interfaces,
        flags: AccessFlags::from_bits_truncate(def.access_flags),
        source_file,
        fields,
        methods,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ClassBuilder, DexBuilder, Insn, InvokeKind, MethodBuilder};

    fn sample() -> Vec<u8> {
        let mut builder = DexBuilder::new();
        builder.class(
            ClassBuilder::new("com.example.Main")
                .superclass("android.app.Activity")
                .interface("java.lang.Runnable")
                .field("secret", "Ljava/lang/String;")
                .method(MethodBuilder::new("<init>", "()V").code(vec![
                    Insn::Invoke(
                        InvokeKind::Direct,
                        MethodRef::new("android.app.Activity", "<init>", "()V"),
                    ),
                    Insn::ReturnVoid,
                ]))
                .method(MethodBuilder::new("onCreate", "(Landroid/os/Bundle;)V").code(vec![
                    Insn::ConstString("http://example.com".to_string()),
                    Insn::NewInstance("java.net.URL".to_string()),
                    Insn::Invoke(
                        InvokeKind::Virtual,
                        MethodRef::new("com.example.Main", "run", "()V"),
                    ),
                    Insn::ReturnVoid,
                ]))
                .method(MethodBuilder::new("run", "()V").code(vec![Insn::ReturnVoid]))
                .method(MethodBuilder::new("nativeCall", "(I[J)Ljava/lang/String;").no_code()),
        );
        builder.class(ClassBuilder::new("com.example.Helper"));
        builder.build().unwrap()
    }

    #[test]
    fn load_classes() {
        let image = DexImage::parse(&sample()).unwrap();
        assert_eq!(image.version(), 35);
        assert!(image.warnings().is_empty(), "{:?}", image.warnings());
        assert!(!image.is_cancelled());

        let main = &image.classes()[0];
        assert_eq!(main.name, "com.example.Main");
        assert_eq!(main.superclass.as_deref(), Some("android.app.Activity"));
        assert_eq!(main.interfaces, vec!["java.lang.Runnable"]);
        assert_eq!(main.fields[0].name, "secret");
        assert_eq!(main.fields[0].typ, "java.lang.String");

        let on_create = main.method("onCreate", "(Landroid/os/Bundle;)V").unwrap();
        assert!(on_create.has_code);
        assert_eq!(
            on_create.invocations,
            vec![MethodRef::new("com.example.Main", "run", "()V")]
        );
        assert!(on_create.strings.contains("http://example.com"));
        assert!(on_create.types.contains("java.net.URL"));

        let native = main.method("nativeCall", "(I[J)Ljava/lang/String;").unwrap();
        assert!(!native.has_code);

        assert_eq!(image.classes()[1].name, "com.example.Helper");
        assert_eq!(
            image.classes()[1].superclass.as_deref(),
            Some("java.lang.Object")
        );
        assert!(image.type_names().contains(&"java.net.URL".to_string()));
    }

    #[test]
    fn truncated_method_table_is_fatal() {
        let bytes = sample();
        let (_, header) = header_parser(&bytes).finish().unwrap();
        let truncated = &bytes[..header.method_ids.off];
        assert!(matches!(
            DexImage::parse(truncated),
            Err(DexError::MalformedImage(_))
        ));
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut bytes = sample();
        bytes[0] = b'x';
        assert!(matches!(
            DexImage::parse(&bytes),
            Err(DexError::MalformedImage(_))
        ));
        assert!(DexImage::parse(&[]).is_err());
    }

    #[test]
    fn checksum_mismatch_is_a_warning() {
        let mut bytes = sample();
        bytes[8] ^= 0xff;
        let image = DexImage::parse(&bytes).unwrap();
        assert_eq!(image.warnings().len(), 1);
        assert!(matches!(
            image.warnings()[0],
            DexError::ChecksumMismatch { .. }
        ));
        assert_eq!(image.classes().len(), 2);
    }

    #[test]
    fn malformed_method_is_skipped() {
        let mut builder = DexBuilder::new();
        builder.class(
            ClassBuilder::new("com.example.Broken")
                .method(MethodBuilder::new("ok", "()V").code(vec![Insn::ReturnVoid]))
                // invoke-virtual cut after its opcode unit
                .method(MethodBuilder::new("cut", "()V").code(vec![Insn::Raw(vec![0x006e])])),
        );
        let image = DexImage::parse(&builder.build().unwrap()).unwrap();
        let class = &image.classes()[0];
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].name(), "ok");
        assert!(matches!(
            image.warnings()[0],
            DexError::MalformedMethod { .. }
        ));
    }

    #[test]
    fn malformed_class_is_skipped() {
        let mut builder = DexBuilder::new();
        builder.class(
            ClassBuilder::new("com.example.Broken")
                .method(MethodBuilder::new("run", "()V").code(vec![Insn::ReturnVoid])),
        );
        builder.class(ClassBuilder::new("com.example.Fine"));
        let mut bytes = builder.build().unwrap();
        // point the first class data past the end of the image
        let (_, header) = header_parser(&bytes).finish().unwrap();
        let data_off = header.class_defs.off + 24;
        bytes[data_off..data_off + 4].copy_from_slice(&0x00ff_ffffu32.to_le_bytes());

        let image = DexImage::parse(&bytes).unwrap();
        assert_eq!(image.classes().len(), 1);
        assert_eq!(image.classes()[0].name, "com.example.Fine");
        assert!(image
            .warnings()
            .iter()
            .any(|w| matches!(w, DexError::MalformedClass { class, .. } if class == "com.example.Broken")));
    }

    #[test]
    fn cancellation_stops_between_classes() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let image = DexImage::parse_with(&sample(), &cancel).unwrap();
        assert!(image.is_cancelled());
        assert!(image.classes().is_empty());
    }
}
