// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Java's modified UTF-8, as stored in class files and written by
//! `DataOutput.writeUTF`.
//!
//! NUL is encoded as `C0 80` and supplementary characters as a surrogate pair
//! of 3-byte sequences.

use std::borrow::Cow;

/// Decode modified UTF-8. Returns `None` for malformed input.
pub fn decode(data: &[u8]) -> Option<Cow<'_, str>> {
    cesu8::from_java_cesu8(data).ok()
}

pub fn encode(text: &str) -> Cow<'_, [u8]> {
    cesu8::to_java_cesu8(text)
}
