//! Dex image writer, used to craft bytecode images in tests.
//!
//! Only what the loader reads is written: there is no map list, no debug
//! information and no annotation.

use crate::errors::{DexError, DexResult};
use crate::flags::AccessFlags;
use crate::loader::{ENDIAN_CONSTANT, HEADER_SIZE, NO_INDEX};
use crate::model::MethodRef;
use crate::mutf8;
use crate::types::{split_method_descriptor, Type};
use da_utils::leb::write_uleb128;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Super,
    Direct,
    Static,
    Interface,
}

impl InvokeKind {
    const fn opcode(self) -> u16 {
        match self {
            Self::Virtual => 0x6e,
            Self::Super => 0x6f,
            Self::Direct => 0x70,
            Self::Static => 0x71,
            Self::Interface => 0x72,
        }
    }
}

/// An instruction, with its references given symbolically.
#[derive(Debug, Clone)]
pub enum Insn {
    ConstString(String),
    ConstClass(String),
    NewInstance(String),
    Invoke(InvokeKind, MethodRef),
    InvokeRange(InvokeKind, MethodRef),
    ReturnVoid,
    Nop,
    /// Code units written as is.
    Raw(Vec<u16>),
}

#[derive(Debug, Clone)]
pub struct MethodBuilder {
    name: String,
    descriptor: String,
    flags: AccessFlags,
    code: Option<Vec<Insn>>,
}

impl MethodBuilder {
    #[must_use]
    pub fn new(name: &str, descriptor: &str) -> Self {
        let mut flags = AccessFlags::ACC_PUBLIC;
        if name == "<init>" {
            flags |= AccessFlags::ACC_CONSTRUCTOR;
        } else if name == "<clinit>" {
            flags = AccessFlags::ACC_STATIC | AccessFlags::ACC_CONSTRUCTOR;
        }
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            flags,
            code: None,
        }
    }

    #[must_use]
    pub fn flags(mut self, flags: AccessFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn code(mut self, code: Vec<Insn>) -> Self {
        self.code = Some(code);
        self
    }

    /// Declares the method abstract.
    #[must_use]
    pub fn no_code(mut self) -> Self {
        self.flags |= AccessFlags::ACC_ABSTRACT;
        self.code = None;
        self
    }

    fn is_direct(&self) -> bool {
        self.name.starts_with('<')
            || self
                .flags
                .intersects(AccessFlags::ACC_STATIC | AccessFlags::ACC_PRIVATE)
    }
}

#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    flags: AccessFlags,
    source_file: Option<String>,
    fields: Vec<(String, String, AccessFlags)>,
    methods: Vec<MethodBuilder>,
}

impl ClassBuilder {
    /// A public class extending `java.lang.Object`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            superclass: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            flags: AccessFlags::ACC_PUBLIC,
            source_file: None,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn superclass(mut self, name: &str) -> Self {
        self.superclass = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn root(mut self) -> Self {
        self.superclass = None;
        self
    }

    #[must_use]
    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: AccessFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn source_file(mut self, name: &str) -> Self {
        self.source_file = Some(name.to_string());
        self
    }

    /// Adds a private instance field, `descriptor` being its type
    /// descriptor.
    #[must_use]
    pub fn field(self, name: &str, descriptor: &str) -> Self {
        self.field_with(name, descriptor, AccessFlags::ACC_PRIVATE)
    }

    #[must_use]
    pub fn field_with(mut self, name: &str, descriptor: &str, flags: AccessFlags) -> Self {
        self.fields
            .push((name.to_string(), descriptor.to_string(), flags));
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    fn descriptor(&self) -> String {
        Type::class(&self.name).to_string()
    }
}

fn class_descriptor(name: &str) -> String {
    Type::class(name).to_string()
}

/// Key of a method id: owner descriptor, name and prototype descriptor.
type MemberKey = (String, String, String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Proto {
    return_type: String,
    parameters: Vec<String>,
    shorty: String,
}

impl Proto {
    fn new(descriptor: &str) -> DexResult<Self> {
        let (parameters, return_type) = split_method_descriptor(descriptor)?;
        let shorty = std::iter::once(&return_type)
            .chain(parameters.iter())
            .map(Type::shorty)
            .collect();
        Ok(Self {
            return_type: return_type.to_string(),
            parameters: parameters.iter().map(ToString::to_string).collect(),
            shorty,
        })
    }
}

/// Everything referenced by the classes, before indexes are assigned.
#[derive(Default)]
struct Pools {
    strings: BTreeSet<String>,
    types: BTreeSet<String>,
    protos: BTreeMap<String, Proto>,
    fields: BTreeSet<MemberKey>,
    methods: BTreeSet<MemberKey>,
}

impl Pools {
    fn proto(&mut self, descriptor: &str) -> DexResult<()> {
        if !self.protos.contains_key(descriptor) {
            let proto = Proto::new(descriptor)?;
            self.protos.insert(descriptor.to_string(), proto);
        }
        Ok(())
    }

    fn method(&mut self, method: &MethodRef) -> DexResult<()> {
        self.proto(&method.descriptor)?;
        self.methods.insert((
            class_descriptor(&method.owner),
            method.name.clone(),
            method.descriptor.clone(),
        ));
        Ok(())
    }

    fn collect(classes: &[ClassBuilder]) -> DexResult<Self> {
        let mut pools = Self::default();
        for class in classes {
            let owner = class.descriptor();
            pools.types.insert(owner.clone());
            pools
                .types
                .extend(class.superclass.iter().map(|s| class_descriptor(s)));
            pools
                .types
                .extend(class.interfaces.iter().map(|s| class_descriptor(s)));
            pools.strings.extend(class.source_file.iter().cloned());
            for (name, typ, _) in &class.fields {
                pools
                    .fields
                    .insert((owner.clone(), name.clone(), typ.clone()));
            }
            for method in &class.methods {
                pools.method(&MethodRef::new(&class.name, &method.name, &method.descriptor))?;
                for insn in method.code.iter().flatten() {
                    match insn {
                        Insn::ConstString(s) => {
                            pools.strings.insert(s.clone());
                        }
                        Insn::ConstClass(t) | Insn::NewInstance(t) => {
                            pools.types.insert(class_descriptor(t));
                        }
                        Insn::Invoke(_, m) | Insn::InvokeRange(_, m) => pools.method(m)?,
                        Insn::ReturnVoid | Insn::Nop | Insn::Raw(_) => (),
                    }
                }
            }
        }

        for (owner, name, typ) in &pools.fields {
            pools.types.insert(owner.clone());
            pools.types.insert(typ.clone());
            pools.strings.insert(name.clone());
        }
        for (owner, name, _) in &pools.methods {
            pools.types.insert(owner.clone());
            pools.strings.insert(name.clone());
        }
        for proto in pools.protos.values() {
            pools.types.insert(proto.return_type.clone());
            pools.types.extend(proto.parameters.iter().cloned());
            pools.strings.insert(proto.shorty.clone());
        }
        pools.strings.extend(pools.types.iter().cloned());
        Ok(pools)
    }
}

fn index_of<K: Ord + ?Sized>(map: &BTreeMap<&K, u32>, key: &K, what: &str) -> DexResult<u32> {
    map.get(key)
        .copied()
        .ok_or_else(|| DexError::MalformedImage(format!("unknown {what}")))
}

fn align(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

fn push_u16(data: &mut Vec<u8>, v: u16) {
    data.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(data: &mut Vec<u8>, v: u32) {
    data.extend_from_slice(&v.to_le_bytes());
}

/// Builds a version 035 dex image.
#[derive(Debug, Default)]
pub struct DexBuilder {
    classes: Vec<ClassBuilder>,
}

impl DexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(&mut self, class: ClassBuilder) -> &mut Self {
        self.classes.push(class);
        self
    }

    pub fn build(&self) -> DexResult<Vec<u8>> {
        let pools = Pools::collect(&self.classes)?;

        let strings: BTreeMap<&str, u32> = pools
            .strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i as u32))
            .collect();
        // types sort by string index, which follows descriptor order here
        let types: BTreeMap<&str, u32> = pools
            .types
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i as u32))
            .collect();
        let mut protos = pools.protos.iter().collect::<Vec<_>>();
        protos.sort_by(|a, b| (&a.1.return_type, &a.1.parameters).cmp(&(&b.1.return_type, &b.1.parameters)));
        let protos_idx: BTreeMap<&str, u32> = protos
            .iter()
            .enumerate()
            .map(|(i, (d, _))| (d.as_str(), i as u32))
            .collect();
        let fields: BTreeMap<&MemberKey, u32> = pools
            .fields
            .iter()
            .enumerate()
            .map(|(i, k)| (k, i as u32))
            .collect();
        let methods: BTreeMap<&MemberKey, u32> = pools
            .methods
            .iter()
            .enumerate()
            .map(|(i, k)| (k, i as u32))
            .collect();

        let string_ids_off = HEADER_SIZE;
        let type_ids_off = string_ids_off + strings.len() * 4;
        let proto_ids_off = type_ids_off + types.len() * 4;
        let field_ids_off = proto_ids_off + protos.len() * 12;
        let method_ids_off = field_ids_off + fields.len() * 8;
        let class_defs_off = method_ids_off + methods.len() * 8;
        let data_off = class_defs_off + self.classes.len() * 32;

        let mut data = Vec::new();

        let mut string_offs = Vec::with_capacity(strings.len());
        for s in &pools.strings {
            string_offs.push((data_off + data.len()) as u32);
            write_uleb128(&mut data, s.encode_utf16().count() as u32);
            data.extend(mutf8::encode(s));
            data.push(0);
        }

        let mut type_lists: BTreeMap<Vec<u32>, u32> = BTreeMap::new();
        let mut type_list = |data: &mut Vec<u8>, list: Vec<u32>| -> u32 {
            if list.is_empty() {
                return 0;
            }
            if let Some(off) = type_lists.get(&list) {
                return *off;
            }
            align(data);
            let off = (data_off + data.len()) as u32;
            push_u32(data, list.len() as u32);
            for idx in &list {
                push_u16(data, *idx as u16);
            }
            type_lists.insert(list, off);
            off
        };

        let mut proto_items = Vec::with_capacity(protos.len());
        for (_, proto) in &protos {
            let params = proto
                .parameters
                .iter()
                .map(|p| index_of(&types, p.as_str(), "type"))
                .collect::<DexResult<Vec<_>>>()?;
            proto_items.push((
                index_of(&strings, proto.shorty.as_str(), "string")?,
                index_of(&types, proto.return_type.as_str(), "type")?,
                type_list(&mut data, params),
            ));
        }

        let mut interfaces_offs = Vec::with_capacity(self.classes.len());
        for class in &self.classes {
            let list = class
                .interfaces
                .iter()
                .map(|i| index_of(&types, class_descriptor(i).as_str(), "type"))
                .collect::<DexResult<Vec<_>>>()?;
            interfaces_offs.push(type_list(&mut data, list));
        }

        // code items, keyed by method index
        let mut code_offs = BTreeMap::new();
        for class in &self.classes {
            for method in &class.methods {
                let Some(code) = &method.code else { continue };
                let key = (class.descriptor(), method.name.clone(), method.descriptor.clone());
                let idx = index_of(&methods, &key, "method")?;
                let mut insns = Vec::new();
                for insn in code {
                    self.encode(insn, &strings, &types, &methods, &mut insns)?;
                }
                align(&mut data);
                code_offs.insert(idx, (data_off + data.len()) as u32);
                push_u16(&mut data, 1); // registers
                push_u16(&mut data, 0); // ins
                push_u16(&mut data, 0); // outs
                push_u16(&mut data, 0); // tries
                push_u32(&mut data, 0); // debug_info_off
                push_u32(&mut data, insns.len() as u32);
                for unit in insns {
                    push_u16(&mut data, unit);
                }
            }
        }

        let mut class_data_offs = Vec::with_capacity(self.classes.len());
        for class in &self.classes {
            if class.fields.is_empty() && class.methods.is_empty() {
                class_data_offs.push(0);
                continue;
            }
            let owner = class.descriptor();
            let (mut statics, mut instances) = (Vec::new(), Vec::new());
            for (name, typ, flags) in &class.fields {
                let idx = index_of(&fields, &(owner.clone(), name.clone(), typ.clone()), "field")?;
                if flags.contains(AccessFlags::ACC_STATIC) {
                    statics.push((idx, flags.bits(), 0));
                } else {
                    instances.push((idx, flags.bits(), 0));
                }
            }
            let (mut direct, mut virtuals) = (Vec::new(), Vec::new());
            for method in &class.methods {
                let key = (owner.clone(), method.name.clone(), method.descriptor.clone());
                let idx = index_of(&methods, &key, "method")?;
                let code_off = code_offs.get(&idx).copied().unwrap_or(0);
                if method.is_direct() {
                    direct.push((idx, method.flags.bits(), code_off));
                } else {
                    virtuals.push((idx, method.flags.bits(), code_off));
                }
            }

            class_data_offs.push((data_off + data.len()) as u32);
            for list in [&statics, &instances, &direct, &virtuals] {
                write_uleb128(&mut data, list.len() as u32);
            }
            for (list, with_code) in [
                (&mut statics, false),
                (&mut instances, false),
                (&mut direct, true),
                (&mut virtuals, true),
            ] {
                list.sort_unstable();
                let mut prev = 0;
                for (idx, flags, code_off) in list.iter() {
                    write_uleb128(&mut data, idx - prev);
                    write_uleb128(&mut data, *flags);
                    if with_code {
                        write_uleb128(&mut data, *code_off);
                    }
                    prev = *idx;
                }
            }
        }

        let mut out = Vec::with_capacity(data_off + data.len());
        out.extend_from_slice(b"dex\n035\0");
        push_u32(&mut out, 0); // checksum
        out.extend_from_slice(&[0; 20]); // signature
        push_u32(&mut out, (data_off + data.len()) as u32);
        push_u32(&mut out, HEADER_SIZE as u32);
        push_u32(&mut out, ENDIAN_CONSTANT);
        push_u32(&mut out, 0); // link_size
        push_u32(&mut out, 0); // link_off
        push_u32(&mut out, 0); // map_off
        for (size, off) in [
            (strings.len(), string_ids_off),
            (types.len(), type_ids_off),
            (protos.len(), proto_ids_off),
            (fields.len(), field_ids_off),
            (methods.len(), method_ids_off),
            (self.classes.len(), class_defs_off),
            (data.len(), data_off),
        ] {
            push_u32(&mut out, size as u32);
            push_u32(&mut out, if size == 0 { 0 } else { off as u32 });
        }

        for off in string_offs {
            push_u32(&mut out, off);
        }
        for descriptor in types.keys() {
            push_u32(&mut out, index_of(&strings, *descriptor, "string")?);
        }
        for (shorty, return_type, params_off) in proto_items {
            push_u32(&mut out, shorty);
            push_u32(&mut out, return_type);
            push_u32(&mut out, params_off);
        }
        for (owner, name, typ) in fields.keys() {
            push_u16(&mut out, index_of(&types, owner.as_str(), "type")? as u16);
            push_u16(&mut out, index_of(&types, typ.as_str(), "type")? as u16);
            push_u32(&mut out, index_of(&strings, name.as_str(), "string")?);
        }
        for (owner, name, proto) in methods.keys() {
            push_u16(&mut out, index_of(&types, owner.as_str(), "type")? as u16);
            push_u16(&mut out, index_of(&protos_idx, proto.as_str(), "proto")? as u16);
            push_u32(&mut out, index_of(&strings, name.as_str(), "string")?);
        }
        for (i, class) in self.classes.iter().enumerate() {
            push_u32(&mut out, index_of(&types, class.descriptor().as_str(), "type")?);
            push_u32(&mut out, class.flags.bits());
            let superclass = match &class.superclass {
                Some(s) => index_of(&types, class_descriptor(s).as_str(), "type")?,
                None => NO_INDEX,
            };
            push_u32(&mut out, superclass);
            push_u32(&mut out, interfaces_offs[i]);
            let source_file = match &class.source_file {
                Some(s) => index_of(&strings, s.as_str(), "string")?,
                None => NO_INDEX,
            };
            push_u32(&mut out, source_file);
            push_u32(&mut out, 0); // annotations_off
            push_u32(&mut out, class_data_offs[i]);
            push_u32(&mut out, 0); // static_values_off
        }
        out.extend(data);

        let signature = Sha1::digest(&out[32..]);
        out[12..32].copy_from_slice(&signature);
        let checksum = adler32::RollingAdler32::from_buffer(&out[12..]).hash();
        out[8..12].copy_from_slice(&checksum.to_le_bytes());

        Ok(out)
    }

    fn encode(
        &self,
        insn: &Insn,
        strings: &BTreeMap<&str, u32>,
        types: &BTreeMap<&str, u32>,
        methods: &BTreeMap<&MemberKey, u32>,
        out: &mut Vec<u16>,
    ) -> DexResult<()> {
        match insn {
            Insn::ConstString(s) => {
                let idx = index_of(strings, s.as_str(), "string")?;
                if idx > 0xffff {
                    out.extend([0x1b, idx as u16, (idx >> 16) as u16]);
                } else {
                    out.extend([0x1a, idx as u16]);
                }
            }
            Insn::ConstClass(t) => {
                out.extend([0x1c, index_of(types, class_descriptor(t).as_str(), "type")? as u16]);
            }
            Insn::NewInstance(t) => {
                out.extend([0x22, index_of(types, class_descriptor(t).as_str(), "type")? as u16]);
            }
            Insn::Invoke(kind, m) | Insn::InvokeRange(kind, m) => {
                let key = (class_descriptor(&m.owner), m.name.clone(), m.descriptor.clone());
                let idx = index_of(methods, &key, "method")?;
                let opcode = match insn {
                    Insn::InvokeRange(..) => kind.opcode() + 6,
                    _ => kind.opcode(),
                };
                out.extend([opcode, idx as u16, 0]);
            }
            Insn::ReturnVoid => out.push(0x0e),
            Insn::Nop => out.push(0x00),
            Insn::Raw(units) => out.extend(units),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DexImage;

    #[test]
    fn empty_image() {
        let bytes = DexBuilder::new().build().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        let image = DexImage::parse(&bytes).unwrap();
        assert!(image.classes().is_empty());
        assert!(image.warnings().is_empty());
    }

    #[test]
    fn static_and_range_members() {
        let mut builder = DexBuilder::new();
        builder.class(
            ClassBuilder::new("a.B")
                .source_file("B.java")
                .field_with("KEY", "Ljava/lang/String;", AccessFlags::ACC_STATIC | AccessFlags::ACC_FINAL)
                .method(MethodBuilder::new("<clinit>", "()V").code(vec![
                    Insn::ConstClass("a.B".to_string()),
                    Insn::InvokeRange(InvokeKind::Static, MethodRef::new("a.B", "go", "(JJ)V")),
                    Insn::Nop,
                    Insn::ReturnVoid,
                ]))
                .method(
                    MethodBuilder::new("go", "(JJ)V")
                        .flags(AccessFlags::ACC_STATIC)
                        .code(vec![Insn::ReturnVoid]),
                ),
        );
        let image = DexImage::parse(&builder.build().unwrap()).unwrap();
        let class = &image.classes()[0];
        assert_eq!(class.source_file.as_deref(), Some("B.java"));
        assert!(class.fields[0].flags.contains(AccessFlags::ACC_STATIC));
        let clinit = class.method("<clinit>", "()V").unwrap();
        assert_eq!(clinit.invocations, vec![MethodRef::new("a.B", "go", "(JJ)V")]);
        assert!(clinit.types.contains("a.B"));
    }
}
