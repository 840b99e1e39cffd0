// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::path::Path;

/// Separates an archive path from the name of an entry inside it.
pub const ARCHIVE_SEPARATOR: char = '@';

/// Location of a file on disk or inside (possibly nested) archives.
///
/// Path separators are normalized to `/`. Archive nesting is expressed with
/// [`ARCHIVE_SEPARATOR`], e.g. `/app/lib/app.war@WEB-INF/lib/core.jar@com/foo/Bar.class`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Location(String);

impl Location {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().replace('\\', "/");
        Self(path)
    }

    /// Location of the entry `name` inside the archive at `self`.
    pub fn nested(&self, name: &str) -> Self {
        let name = name.replace('\\', "/");
        Self(format!("{}{ARCHIVE_SEPARATOR}{name}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_archive_entry(&self) -> bool {
        self.0.contains(ARCHIVE_SEPARATOR)
    }

    /// The on-disk file, followed by each archive entry name in nesting order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(ARCHIVE_SEPARATOR)
    }

    pub fn file_name(&self) -> &str {
        self.0
            .rsplit(|c| c == '/' || c == ARCHIVE_SEPARATOR)
            .next()
            .unwrap_or(&self.0)
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.0
    }
}

impl AsRef<str> for Location {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
