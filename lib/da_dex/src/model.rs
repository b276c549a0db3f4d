//! The class model extracted from bytecode images.

use crate::flags::AccessFlags;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// A method reference, as found in the method id table.
///
/// `owner` is the qualified name of the defining type and `descriptor` the
/// Dalvik prototype (`(Landroid/os/Bundle;)V`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MethodRef {
    #[must_use]
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}->{}{}", self.owner, self.name, self.descriptor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    /// Java form of the field type.
    pub typ: String,
    pub flags: AccessFlags,
}

/// A method declared by a class, with the facts extracted from its code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub reference: MethodRef,
    pub flags: AccessFlags,
    pub has_code: bool,
    /// Targets of the invoke instructions, in code order.
    pub invocations: Vec<MethodRef>,
    /// String constants loaded by the code.
    pub strings: BTreeSet<String>,
    /// Qualified names of the types loaded, instantiated or checked.
    pub types: BTreeSet<String>,
}

impl MethodDef {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.reference.name
    }
}

/// A class defined by a bytecode image.
///
/// Related classes are referred to by qualified name; they may be defined
/// by another image or by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    /// Absent only for the root object type.
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub flags: AccessFlags,
    pub source_file: Option<String>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDef> {
        self.methods.iter().filter(move |method| method.name() == name)
    }

    #[must_use]
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|method| method.reference.name == name && method.reference.descriptor == descriptor)
    }

    /// Every type this class refers to: its hierarchy plus the types its
    /// code uses or invokes.
    #[must_use]
    pub fn referenced_types(&self) -> BTreeSet<&str> {
        let mut types = BTreeSet::new();
        types.extend(self.superclass.as_deref());
        types.extend(self.interfaces.iter().map(String::as_str));
        for method in &self.methods {
            types.extend(method.types.iter().map(String::as_str));
            types.extend(method.invocations.iter().map(|m| m.owner.as_str()));
        }
        types
    }
}

impl fmt::Display for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.flags.is_empty() {
            write!(f, "{} ", self.flags)?;
        }
        write!(f, "class {}", self.name)?;
        if let Some(superclass) = &self.superclass {
            write!(f, " extends {superclass}")?;
        }
        if !self.interfaces.is_empty() {
            write!(f, " implements {}", self.interfaces.join(", "))?;
        }
        Ok(())
    }
}
