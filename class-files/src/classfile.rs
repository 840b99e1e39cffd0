// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Just enough of the class file format to identify a class: its name,
//! super class, and `SourceFile` attribute.

use std::borrow::Cow;

use thiserror::Error;

use crate::mutf8;

pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;
pub const ZIP_MAGIC: u32 = 0x504B_0304;

/// Kind of content, detected by magic number rather than file extension.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    ClassFile,
    Archive,
    Unknown,
}

impl ContentType {
    pub fn detect(data: &[u8]) -> Self {
        let magic = match data {
            [a, b, c, d, ..] => u32::from_be_bytes([*a, *b, *c, *d]),
            _ => return Self::Unknown,
        };

        match magic {
            CLASS_MAGIC => Self::ClassFile,
            ZIP_MAGIC => Self::Archive,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClassFileError {
    #[error("not a class file (magic {0:#010x})")]
    BadMagic(u32),

    #[error("class file truncated at offset {0}")]
    Truncated(usize),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstant { tag: u8, index: u16 },

    #[error("constant pool index {index} is not a {expected} entry")]
    BadReference { index: u16, expected: &'static str },

    #[error("constant pool entry {0} is not valid modified UTF-8")]
    InvalidUtf8(u16),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassHeader {
    pub minor_version: u16,
    pub major_version: u16,
    pub name: String,
    pub super_name: Option<String>,
    pub source_file: Option<String>,
}

pub fn parse_header(data: &[u8]) -> Result<ClassHeader, ClassFileError> {
    let mut bytes = Bytes::new(data);

    let magic = bytes.u32()?;
    if magic != CLASS_MAGIC {
        return Err(ClassFileError::BadMagic(magic));
    }

    let minor_version = bytes.u16()?;
    let major_version = bytes.u16()?;
    let pool = ConstantPool::parse(&mut bytes)?;

    let _access_flags = bytes.u16()?;
    let this_class = bytes.u16()?;
    let super_class = bytes.u16()?;

    let interfaces = bytes.u16()?;
    bytes.skip(2 * usize::from(interfaces))?;

    // Fields, then methods.
    skip_members(&mut bytes)?;
    skip_members(&mut bytes)?;

    let mut source_file = None;
    let attributes = bytes.u16()?;

    for _ in 0..attributes {
        let name = bytes.u16()?;
        let len = bytes.u32()? as usize;
        let body = bytes.take(len)?;

        if pool.utf8(name)? == "SourceFile" {
            if let [hi, lo] = body {
                let index = u16::from_be_bytes([*hi, *lo]);
                source_file = Some(pool.utf8(index)?.into_owned());
            }
        }
    }

    let name = pool.class_name(this_class)?.into_owned();
    let super_name = match super_class {
        0 => None,
        index => Some(pool.class_name(index)?.into_owned()),
    };

    Ok(ClassHeader {
        minor_version,
        major_version,
        name,
        super_name,
        source_file,
    })
}

fn skip_members(bytes: &mut Bytes) -> Result<(), ClassFileError> {
    let count = bytes.u16()?;

    for _ in 0..count {
        // access_flags, name_index, descriptor_index
        bytes.skip(6)?;
        skip_attributes(bytes)?;
    }

    Ok(())
}

fn skip_attributes(bytes: &mut Bytes) -> Result<(), ClassFileError> {
    let count = bytes.u16()?;

    for _ in 0..count {
        bytes.skip(2)?;
        let len = bytes.u32()? as usize;
        bytes.skip(len)?;
    }

    Ok(())
}

enum Constant<'a> {
    Utf8(&'a [u8]),
    Class(u16),
    Other,
    Unusable,
}

struct ConstantPool<'a> {
    entries: Vec<Constant<'a>>,
}

impl<'a> ConstantPool<'a> {
    fn parse(bytes: &mut Bytes<'a>) -> Result<Self, ClassFileError> {
        let count = bytes.u16()?;

        let mut entries = Vec::with_capacity(usize::from(count));
        entries.push(Constant::Unusable);

        let mut index = 1;

        while index < count {
            let tag = bytes.u8()?;

            let constant = match tag {
                1 => {
                    let len = bytes.u16()?;
                    Constant::Utf8(bytes.take(usize::from(len))?)
                }
                7 => Constant::Class(bytes.u16()?),
                8 | 16 | 19 | 20 => {
                    bytes.skip(2)?;
                    Constant::Other
                }
                15 => {
                    bytes.skip(3)?;
                    Constant::Other
                }
                3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                    bytes.skip(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    bytes.skip(8)?;
                    Constant::Other
                }
                _ => return Err(ClassFileError::UnknownConstant { tag, index }),
            };

            entries.push(constant);
            index += 1;

            // Long and double constants take up two slots.
            if matches!(tag, 5 | 6) {
                entries.push(Constant::Unusable);
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    fn utf8(&self, index: u16) -> Result<Cow<'a, str>, ClassFileError> {
        match self.entries.get(usize::from(index)) {
            Some(&Constant::Utf8(data)) => {
                mutf8::decode(data).ok_or(ClassFileError::InvalidUtf8(index))
            }
            _ => Err(ClassFileError::BadReference {
                index,
                expected: "Utf8",
            }),
        }
    }

    fn class_name(&self, index: u16) -> Result<Cow<'a, str>, ClassFileError> {
        match self.entries.get(usize::from(index)) {
            Some(&Constant::Class(name)) => self.utf8(name),
            _ => Err(ClassFileError::BadReference {
                index,
                expected: "Class",
            }),
        }
    }
}

struct Bytes<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Bytes<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ClassFileError::Truncated(self.pos))?;

        let data = &self.data[self.pos..end];
        self.pos = end;

        Ok(data)
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassFileError> {
        self.take(len).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ClassFileError> {
        let data = self.take(2)?;
        Ok(u16::from_be_bytes([data[0], data[1]]))
    }

    fn u32(&mut self) -> Result<u32, ClassFileError> {
        let data = self.take(4)?;
        Ok(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
    }
}
