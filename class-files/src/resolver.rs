// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::classfile::ContentType;
use crate::error::{DuplicateClassConflict, ResolutionError};
use crate::filter::LocationFilter;
use crate::path::Location;
use crate::{ClassEntry, ClassId};

/// Largest archive entry read into memory, nested archives included.
const MAX_ENTRY_SIZE: u64 = 1 << 30;

const PREALLOCATE_LIMIT: u64 = 1 << 20;

/// What to do when two class files share a name but differ in content.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DuplicatePolicy {
    #[default]
    Fail,

    /// Keep the first definition and warn about the rest.
    KeepFirst,
}

/// Enumerates class files under a set of roots.
///
/// Roots may be directories, archives, or single class files. Archives are
/// opened recursively, at any nesting depth. Content is recognized by magic
/// number, so file extensions do not matter.
#[derive(Clone, Debug)]
pub struct ClassResolver {
    roots: Vec<PathBuf>,
    filter: LocationFilter,
    duplicates: DuplicatePolicy,
}

impl ClassResolver {
    pub fn new<P: Into<PathBuf>>(roots: impl IntoIterator<Item = P>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            filter: LocationFilter::default(),
            duplicates: DuplicatePolicy::default(),
        }
    }

    /// Only yield class files whose location passes `filter`.
    ///
    /// Archives are always descended into, regardless of the filter.
    pub fn filter(mut self, filter: LocationFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Validate the roots and start enumerating.
    ///
    /// Entries are read lazily as the returned iterator advances.
    pub fn resolve(self) -> Result<ClassEntries, ResolutionError> {
        for root in &self.roots {
            check_root(root)?;
        }

        Ok(ClassEntries {
            roots: self.roots.into(),
            stack: vec![],
            filter: self.filter,
            duplicates: self.duplicates,
            seen: HashMap::new(),
        })
    }
}

fn check_root(root: &Path) -> Result<(), ResolutionError> {
    let metadata = match std::fs::metadata(root) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ResolutionError::MissingRoot {
                path: root.to_owned(),
            });
        }
        Err(source) => {
            return Err(ResolutionError::UnreadableRoot {
                path: root.to_owned(),
                source,
            });
        }
    };

    let readable = if metadata.is_dir() {
        std::fs::read_dir(root).map(|_| ())
    } else {
        File::open(root).map(|_| ())
    };

    readable.map_err(|source| ResolutionError::UnreadableRoot {
        path: root.to_owned(),
        source,
    })
}

trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

struct ArchiveFrame {
    location: Location,
    archive: ZipArchive<Box<dyn ReadSeek>>,
    next: usize,
}

enum Frame {
    Directory(walkdir::IntoIter),
    Archive(ArchiveFrame),
}

enum Step {
    Done,
    Skip,
    File(PathBuf),
    Entry(Location, Vec<u8>),
}

/// Lazy iterator over resolved class files.
///
/// Yields an error only for a duplicate conflict under [`DuplicatePolicy::Fail`].
/// Unreadable or malformed entries are logged and skipped.
pub struct ClassEntries {
    roots: VecDeque<PathBuf>,
    stack: Vec<Frame>,
    filter: LocationFilter,
    duplicates: DuplicatePolicy,
    seen: HashMap<String, (ClassId, Location)>,
}

impl ClassEntries {
    fn open_root(&mut self, root: PathBuf) {
        // A file root is yielded as the walk's only entry.
        let walk = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        self.stack.push(Frame::Directory(walk));
    }

    fn open_file(&mut self, path: &Path) -> Option<Result<ClassEntry, ResolutionError>> {
        let location = Location::new(path);

        let content = match sniff(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("unable to read `{}`: {}", location, err);
                return None;
            }
        };

        match content {
            ContentType::Archive => {
                let file = match File::open(path) {
                    Ok(file) => file,
                    Err(err) => {
                        warn!("unable to open archive `{}`: {}", location, err);
                        return None;
                    }
                };
                self.open_archive(location, Box::new(BufReader::new(file)));
                None
            }
            ContentType::ClassFile => match std::fs::read(path) {
                Ok(data) => self.visit_class(location, data),
                Err(err) => {
                    warn!("unable to read class file `{}`: {}", location, err);
                    None
                }
            },
            ContentType::Unknown => None,
        }
    }

    fn open_archive(&mut self, location: Location, reader: Box<dyn ReadSeek>) {
        match ZipArchive::new(reader) {
            Ok(archive) => self.stack.push(Frame::Archive(ArchiveFrame {
                location,
                archive,
                next: 0,
            })),
            Err(err) => warn!("skipping unreadable archive `{}`: {}", location, err),
        }
    }

    fn visit_entry(
        &mut self,
        location: Location,
        data: Vec<u8>,
    ) -> Option<Result<ClassEntry, ResolutionError>> {
        match ContentType::detect(&data) {
            ContentType::Archive => {
                self.open_archive(location, Box::new(Cursor::new(data)));
                None
            }
            ContentType::ClassFile => self.visit_class(location, data),
            ContentType::Unknown => None,
        }
    }

    fn visit_class(
        &mut self,
        location: Location,
        data: Vec<u8>,
    ) -> Option<Result<ClassEntry, ResolutionError>> {
        if !self.filter.is_included(&location) {
            debug!("excluded by location filter: {}", location);
            return None;
        }

        let entry = match ClassEntry::parse(location, data.into()) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping malformed class file: {}", err);
                return None;
            }
        };

        match self.seen.get(&entry.name) {
            None => {
                self.seen
                    .insert(entry.name.clone(), (entry.id, entry.location.clone()));
                Some(Ok(entry))
            }
            Some((id, first)) if *id == entry.id => {
                debug!(
                    "ignoring identical copy of class {} at `{}` (first seen at `{}`)",
                    entry.name, entry.location, first
                );
                None
            }
            Some((id, first)) => {
                let conflict = DuplicateClassConflict {
                    name: entry.name.clone(),
                    first: first.clone(),
                    first_id: *id,
                    second: entry.location.clone(),
                    second_id: entry.id,
                };

                match self.duplicates {
                    DuplicatePolicy::Fail => Some(Err(conflict.into())),
                    DuplicatePolicy::KeepFirst => {
                        warn!("{}; keeping the first definition", conflict);
                        None
                    }
                }
            }
        }
    }
}

impl Iterator for ClassEntries {
    type Item = Result<ClassEntry, ResolutionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match self.stack.last_mut() {
                None => {
                    let root = self.roots.pop_front()?;
                    self.open_root(root);
                    continue;
                }
                Some(Frame::Directory(walk)) => next_file(walk),
                Some(Frame::Archive(frame)) => next_entry(frame),
            };

            let item = match step {
                Step::Done => {
                    self.stack.pop();
                    None
                }
                Step::Skip => None,
                Step::File(path) => self.open_file(&path),
                Step::Entry(location, data) => self.visit_entry(location, data),
            };

            if item.is_some() {
                return item;
            }
        }
    }
}

fn next_file(walk: &mut walkdir::IntoIter) -> Step {
    match walk.next() {
        None => Step::Done,
        Some(Ok(entry)) if entry.file_type().is_file() => Step::File(entry.into_path()),
        Some(Ok(_)) => Step::Skip,
        Some(Err(err)) => {
            warn!("skipping unreadable directory entry: {}", err);
            Step::Skip
        }
    }
}

fn next_entry(frame: &mut ArchiveFrame) -> Step {
    if frame.next >= frame.archive.len() {
        return Step::Done;
    }

    let index = frame.next;
    frame.next += 1;

    let mut file = match frame.archive.by_index(index) {
        Ok(file) => file,
        Err(err) => {
            warn!(
                "skipping unreadable entry {} of `{}`: {}",
                index, frame.location, err
            );
            return Step::Skip;
        }
    };

    if file.is_dir() {
        return Step::Skip;
    }

    let location = frame.location.nested(file.name());

    // The declared size comes from the archive and may be corrupt.
    if file.size() > MAX_ENTRY_SIZE {
        warn!(
            "skipping archive entry `{}` declaring {} bytes",
            location,
            file.size()
        );
        return Step::Skip;
    }

    let capacity = file.size().min(PREALLOCATE_LIMIT) as usize;
    let mut data = Vec::with_capacity(capacity);

    if let Err(err) = (&mut file).take(MAX_ENTRY_SIZE + 1).read_to_end(&mut data) {
        warn!("skipping unreadable archive entry `{}`: {}", location, err);
        return Step::Skip;
    }

    if data.len() as u64 > MAX_ENTRY_SIZE {
        warn!("skipping oversized archive entry `{}`", location);
        return Step::Skip;
    }

    Step::Entry(location, data)
}

fn sniff(path: &Path) -> io::Result<ContentType> {
    let mut magic = Vec::with_capacity(4);
    File::open(path)?.take(4).read_to_end(&mut magic)?;

    Ok(ContentType::detect(&magic))
}
