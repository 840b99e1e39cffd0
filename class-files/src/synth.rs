// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Minimal, structurally valid class files for tests.

use crate::mutf8;

/// Build a class file for `name` (VM form) with no fields or methods.
///
/// `marker` is stored as an unreferenced constant, so builds that differ only
/// in `marker` yield distinct class ids.
pub fn class_file(name: &str, source_file: Option<&str>, marker: &str) -> Vec<u8> {
    let mut data = vec![];

    data.extend(0xCAFE_BABEu32.to_be_bytes());
    // minor, major
    data.extend(0u16.to_be_bytes());
    data.extend(52u16.to_be_bytes());

    data.extend(8u16.to_be_bytes());
    push_utf8(&mut data, name); // 1
    push_class(&mut data, 1); // 2
    push_utf8(&mut data, "java/lang/Object"); // 3
    push_class(&mut data, 3); // 4
    push_utf8(&mut data, "SourceFile"); // 5
    push_utf8(&mut data, source_file.unwrap_or_default()); // 6
    push_utf8(&mut data, marker); // 7

    // access, this, super
    data.extend(0x0021u16.to_be_bytes());
    data.extend(2u16.to_be_bytes());
    data.extend(4u16.to_be_bytes());

    // interfaces, fields, methods
    data.extend(0u16.to_be_bytes());
    data.extend(0u16.to_be_bytes());
    data.extend(0u16.to_be_bytes());

    match source_file {
        Some(_) => {
            data.extend(1u16.to_be_bytes());
            data.extend(5u16.to_be_bytes());
            data.extend(2u32.to_be_bytes());
            data.extend(6u16.to_be_bytes());
        }
        None => data.extend(0u16.to_be_bytes()),
    }

    data
}

fn push_utf8(data: &mut Vec<u8>, text: &str) {
    let encoded = mutf8::encode(text);

    data.push(1);
    data.extend((encoded.len() as u16).to_be_bytes());
    data.extend(encoded.iter());
}

fn push_class(data: &mut Vec<u8>, name_index: u16) {
    data.push(7);
    data.extend(name_index.to_be_bytes());
}
