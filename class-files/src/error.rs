// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::PathBuf;

use thiserror::Error;

use crate::path::Location;
use crate::ClassId;

/// Two class files share a name but differ in content.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error(
    "class `{name}` has conflicting definitions: {first_id} at `{first}` and {second_id} at `{second}`"
)]
pub struct DuplicateClassConflict {
    pub name: String,
    pub first: Location,
    pub first_id: ClassId,
    pub second: Location,
    pub second_id: ClassId,
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("class root `{}` does not exist", .path.display())]
    MissingRoot { path: PathBuf },

    #[error("class root `{}` is not readable", .path.display())]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Duplicate(#[from] DuplicateClassConflict),
}
