//! Access flags shared by classes, fields and methods.

use bitflags::bitflags;
use serde::{Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Dalvik access flags
    pub struct AccessFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_SYNCHRONIZED          = 0x00020;
        const ACC_VOLATILE              = 0x00040;
        const ACC_BRIDGE                = 0x00040;
        const ACC_TRANSIENT             = 0x00080;
        const ACC_VARARGS               = 0x00080;
        const ACC_NATIVE                = 0x00100;
        const ACC_INTERFACE             = 0x00200;
        const ACC_ABSTRACT              = 0x00400;
        const ACC_STRICT                = 0x00800;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_ANNOTATION            = 0x02000;
        const ACC_ENUM                  = 0x04000;
        const ACC_CONSTRUCTOR           = 0x10000;
        const ACC_DECLARED_SYNCHRONIZED = 0x20000;
    }
}

const KEYWORDS: [(AccessFlags, &str); 10] = [
    (AccessFlags::ACC_PUBLIC, "public"),
    (AccessFlags::ACC_PRIVATE, "private"),
    (AccessFlags::ACC_PROTECTED, "protected"),
    (AccessFlags::ACC_STATIC, "static"),
    (AccessFlags::ACC_FINAL, "final"),
    (AccessFlags::ACC_NATIVE, "native"),
    (AccessFlags::ACC_INTERFACE, "interface"),
    (AccessFlags::ACC_ABSTRACT, "abstract"),
    (AccessFlags::ACC_SYNTHETIC, "synthetic"),
    (AccessFlags::ACC_CONSTRUCTOR, "constructor"),
];

impl AccessFlags {
    /// Keywords of the flags that are set, in declaration order.
    pub fn keywords(self) -> impl Iterator<Item = &'static str> {
        KEYWORDS
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, keyword)| *keyword)
    }
}

impl fmt::Display for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.keywords().collect::<Vec<_>>().join(" "))
    }
}

impl Serialize for AccessFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.keywords())
    }
}
