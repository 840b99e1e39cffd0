// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[macro_use]
extern crate log;

use std::fmt;

pub mod classfile;
pub mod crc64;
pub mod error;
pub mod filter;
pub mod index;
pub mod mutf8;
pub mod path;
pub mod resolver;

#[cfg(any(test, feature = "test-util"))]
pub mod synth;

pub use crate::error::{DuplicateClassConflict, ResolutionError};
pub use crate::filter::LocationFilter;
pub use crate::index::ClassIndex;
pub use crate::path::Location;
pub use crate::resolver::{ClassEntries, ClassResolver, DuplicatePolicy};

use crate::classfile::ClassFileError;

/// Identifier of a class version: the CRC64 of its raw class file bytes.
///
/// Two class files with the same name but different bytes have different ids.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ClassId(pub u64);

impl ClassId {
    pub fn of(data: &[u8]) -> Self {
        Self(crc64::checksum(data))
    }
}

impl fmt::LowerHex for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A class name paired with the id of one concrete version of it.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ClassIdentity {
    pub name: String,
    pub id: ClassId,
}

impl fmt::Display for ClassIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A class file found under one of the configured class roots.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassEntry {
    /// VM name, e.g. `com/foo/Bar$Inner`.
    pub name: String,

    /// Value of the `SourceFile` attribute, if the compiler emitted one.
    pub source_file: Option<String>,

    pub location: Location,
    pub id: ClassId,
    pub data: Box<[u8]>,
}

impl ClassEntry {
    pub fn parse(location: Location, data: Box<[u8]>) -> Result<Self, ClassFileError> {
        let header = classfile::parse_header(&data)?;
        let id = ClassId::of(&data);

        Ok(Self {
            name: header.name,
            source_file: header.source_file,
            location,
            id,
            data,
        })
    }

    pub fn identity(&self) -> ClassIdentity {
        ClassIdentity {
            name: self.name.clone(),
            id: self.id,
        }
    }

    /// Package part of the VM name, e.g. `com/foo`. Empty for the default package.
    pub fn package(&self) -> &str {
        self.name
            .rsplit_once('/')
            .map(|(package, _)| package)
            .unwrap_or_default()
    }

    /// Source file path relative to the source root, e.g. `com/foo/Bar.java`.
    ///
    /// Falls back to the outermost class name with a `.java` extension when the
    /// class file carries no `SourceFile` attribute.
    pub fn source_path(&self) -> String {
        let file = match &self.source_file {
            Some(file) => file.clone(),
            None => {
                let simple = self.name.rsplit('/').next().unwrap_or(&self.name);
                let outer = simple.split('$').next().unwrap_or(simple);
                format!("{outer}.java")
            }
        };

        match self.package() {
            "" => file,
            package => format!("{package}/{file}"),
        }
    }
}
