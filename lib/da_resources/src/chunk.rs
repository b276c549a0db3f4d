use serde::Serialize;
use std::fmt;

/// Common header of every chunk found in binary XML documents and
/// resource tables.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkHeader {
    pub(crate) typ: ChunkType,
    pub(crate) header_size: usize,
    pub(crate) chunk_size: usize,
}

pub(crate) const CHUNK_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Serialize)]
pub enum ChunkType {
    Null,
    StringPool,
    Table,
    Xml,
    XmlStartNamespace,
    XmlEndNamespace,
    XmlStartElement,
    XmlEndElement,
    XmlCdata,
    XmlResourceMap,
    TablePackage,
    TableType,
    TableTypeSpec,
    TableLibrary,
    TableOverlayable,
    TableOverlayablePolicy,
    TableStagedAlias,
    Unknown(u16),
}

impl ChunkType {
    #[cfg_attr(not(any(test, feature = "writer")), allow(dead_code))]
    pub(crate) const fn tag(self) -> u16 {
        match self {
            Self::Null => 0x0000,
            Self::StringPool => 0x0001,
            Self::Table => 0x0002,
            Self::Xml => 0x0003,
            Self::XmlStartNamespace => 0x0100,
            Self::XmlEndNamespace => 0x0101,
            Self::XmlStartElement => 0x0102,
            Self::XmlEndElement => 0x0103,
            Self::XmlCdata => 0x0104,
            Self::XmlResourceMap => 0x0180,
            Self::TablePackage => 0x0200,
            Self::TableType => 0x0201,
            Self::TableTypeSpec => 0x0202,
            Self::TableLibrary => 0x0203,
            Self::TableOverlayable => 0x0204,
            Self::TableOverlayablePolicy => 0x0205,
            Self::TableStagedAlias => 0x0206,
            Self::Unknown(tag) => tag,
        }
    }
}

impl From<u16> for ChunkType {
    fn from(tag: u16) -> Self {
        match tag {
            0x0000 => Self::Null,
            0x0001 => Self::StringPool,
            0x0002 => Self::Table,
            0x0003 => Self::Xml,
            0x0100 => Self::XmlStartNamespace,
            0x0101 => Self::XmlEndNamespace,
            0x0102 => Self::XmlStartElement,
            0x0103 => Self::XmlEndElement,
            0x0104 => Self::XmlCdata,
            0x0180 => Self::XmlResourceMap,
            0x0200 => Self::TablePackage,
            0x0201 => Self::TableType,
            0x0202 => Self::TableTypeSpec,
            0x0203 => Self::TableLibrary,
            0x0204 => Self::TableOverlayable,
            0x0205 => Self::TableOverlayablePolicy,
            0x0206 => Self::TableStagedAlias,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "RES_NULL_TYPE"),
            Self::StringPool => write!(f, "RES_STRING_POOL_TYPE"),
            Self::Table => write!(f, "RES_TABLE_TYPE"),
            Self::Xml => write!(f, "RES_XML_TYPE"),
            Self::XmlStartNamespace => write!(f, "RES_XML_START_NAMESPACE_TYPE"),
            Self::XmlEndNamespace => write!(f, "RES_XML_END_NAMESPACE_TYPE"),
            Self::XmlStartElement => write!(f, "RES_XML_START_ELEMENT_TYPE"),
            Self::XmlEndElement => write!(f, "RES_XML_END_ELEMENT_TYPE"),
            Self::XmlCdata => write!(f, "RES_XML_CDATA_TYPE"),
            Self::XmlResourceMap => write!(f, "RES_XML_RESOURCE_MAP_TYPE"),
            Self::TablePackage => write!(f, "RES_TABLE_PACKAGE_TYPE"),
            Self::TableType => write!(f, "RES_TABLE_TYPE_TYPE"),
            Self::TableTypeSpec => write!(f, "RES_TABLE_TYPE_SPEC_TYPE"),
            Self::TableLibrary => write!(f, "RES_TABLE_LIBRARY_TYPE"),
            Self::TableOverlayable => write!(f, "RES_TABLE_OVERLAYABLE"),
            Self::TableOverlayablePolicy => write!(f, "RES_TABLE_OVERLAYABLE_POLICY"),
            Self::TableStagedAlias => write!(f, "RES_TABLE_STAGED_ALIAS"),
            Self::Unknown(tag) => write!(f, "UNKNOWN({tag:#06x})"),
        }
    }
}
