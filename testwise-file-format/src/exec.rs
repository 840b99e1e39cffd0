// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! JaCoCo execution data (`.exec`) encoding.
//!
//! A payload is a sequence of blocks, each introduced by a type byte. All
//! integers are big-endian. Strings are a `u16` byte length followed by Java's
//! modified UTF-8.
//! Probe arrays are a var-int count followed by bits packed low-bit first.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use class_files::{mutf8, ClassId};
use coverage::binary::{
    ExecutionData, ExecutionDataDump, IncompatibleExecutionData, SessionInfo,
};
use fixedbitset::FixedBitSet;
use thiserror::Error;

pub const BLOCK_HEADER: u8 = 0x01;
pub const BLOCK_SESSION_INFO: u8 = 0x10;
pub const BLOCK_EXECUTION_DATA: u8 = 0x11;

pub const MAGIC_NUMBER: u16 = 0xC0C0;
pub const FORMAT_VERSION: u16 = 0x1007;

#[derive(Debug, Error)]
#[error("malformed execution data in {provenance} at offset {offset}: {kind}")]
pub struct MalformedDumpError {
    /// Where the payload came from, e.g. a file path or test id.
    pub provenance: String,

    /// Byte offset of the failing block.
    pub offset: u64,

    pub kind: MalformedKind,
}

#[derive(Debug, Error)]
pub enum MalformedKind {
    #[error("expected a header block, found block type {0:#04x}")]
    MissingHeader(u8),

    #[error("invalid magic number {0:#06x}")]
    BadMagic(u16),

    #[error("incompatible format version {0:#06x}, expected 0x1007")]
    IncompatibleVersion(u16),

    #[error("unknown block type {0:#04x}")]
    UnknownBlock(u8),

    #[error("truncated {0} block")]
    Truncated(&'static str),

    #[error("invalid string in {0} block")]
    InvalidString(&'static str),

    #[error("probe count does not fit in 32 bits")]
    InvalidProbeCount,

    #[error(transparent)]
    Incompatible(#[from] IncompatibleExecutionData),

    #[error("read failed: {0}")]
    Io(#[source] io::Error),
}

/// Decode every dump in `data`.
pub fn read_dumps(
    data: &[u8],
    provenance: impl Into<String>,
) -> Result<Vec<ExecutionDataDump>, MalformedDumpError> {
    ExecutionDataReader::new(data, provenance).read_dumps()
}

pub fn read_dump_file(path: impl AsRef<Path>) -> Result<Vec<ExecutionDataDump>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("unable to open execution data `{}`", path.display()))?;

    let dumps = ExecutionDataReader::new(BufReader::new(file), path.display().to_string())
        .read_dumps()?;

    Ok(dumps)
}

/// Encode `dumps` into a complete payload.
pub fn write_dumps<'a>(dumps: impl IntoIterator<Item = &'a ExecutionDataDump>) -> io::Result<Vec<u8>> {
    let mut writer = ExecutionDataWriter::new(Vec::new())?;

    for dump in dumps {
        writer.write_dump(dump)?;
    }

    Ok(writer.into_inner())
}

pub fn write_dump_file(
    path: impl AsRef<Path>,
    dumps: impl IntoIterator<Item = ExecutionDataDump>,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("unable to create execution data `{}`", path.display()))?;

    let mut writer = ExecutionDataWriter::new(BufWriter::new(file))?;

    for dump in dumps {
        writer.write_dump(&dump)?;
    }

    writer.flush()?;

    Ok(())
}

pub struct ExecutionDataReader<R> {
    input: R,
    provenance: String,

    /// Bytes consumed so far.
    offset: u64,

    /// Offset of the block being decoded.
    block_offset: u64,
}

impl<R: Read> ExecutionDataReader<R> {
    pub fn new(input: R, provenance: impl Into<String>) -> Self {
        Self {
            input,
            provenance: provenance.into(),
            offset: 0,
            block_offset: 0,
        }
    }

    /// Decode the whole payload.
    ///
    /// Each session info block starts a new dump. Execution data that precedes
    /// any session info is collected into a dump with an empty session id.
    pub fn read_dumps(mut self) -> Result<Vec<ExecutionDataDump>, MalformedDumpError> {
        let mut dumps: Vec<ExecutionDataDump> = vec![];
        let mut first = true;

        while let Some(block) = self.next_block_type()? {
            if first && block != BLOCK_HEADER {
                return Err(self.malformed(MalformedKind::MissingHeader(block)));
            }
            first = false;

            match block {
                BLOCK_HEADER => self.read_header()?,
                BLOCK_SESSION_INFO => {
                    let session = self.read_session_info()?;
                    dumps.push(ExecutionDataDump::new(session));
                }
                BLOCK_EXECUTION_DATA => {
                    let data = self.read_execution_data()?;

                    if dumps.is_empty() {
                        dumps.push(ExecutionDataDump::default());
                    }

                    if let Some(dump) = dumps.last_mut() {
                        dump.store
                            .put(data)
                            .map_err(|err| self.malformed(err.into()))?;
                    }
                }
                unknown => return Err(self.malformed(MalformedKind::UnknownBlock(unknown))),
            }
        }

        debug!("decoded {} dumps from {}", dumps.len(), self.provenance);

        Ok(dumps)
    }

    fn malformed(&self, kind: MalformedKind) -> MalformedDumpError {
        MalformedDumpError {
            provenance: self.provenance.clone(),
            offset: self.block_offset,
            kind,
        }
    }

    fn next_block_type(&mut self) -> Result<Option<u8>, MalformedDumpError> {
        let mut byte = [0u8];

        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.block_offset = self.offset;
                    self.offset += 1;
                    return Ok(Some(byte[0]));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.malformed(MalformedKind::Io(err))),
            }
        }
    }

    fn read_header(&mut self) -> Result<(), MalformedDumpError> {
        let magic = self.u16("header")?;
        if magic != MAGIC_NUMBER {
            return Err(self.malformed(MalformedKind::BadMagic(magic)));
        }

        let version = self.u16("header")?;
        if version != FORMAT_VERSION {
            return Err(self.malformed(MalformedKind::IncompatibleVersion(version)));
        }

        Ok(())
    }

    fn read_session_info(&mut self) -> Result<SessionInfo, MalformedDumpError> {
        const BLOCK: &str = "session info";

        let id = self.utf(BLOCK)?;
        let start = self.i64(BLOCK)?;
        let dump = self.i64(BLOCK)?;

        Ok(SessionInfo::new(id, start, dump))
    }

    fn read_execution_data(&mut self) -> Result<ExecutionData, MalformedDumpError> {
        const BLOCK: &str = "execution data";

        let id = ClassId(self.i64(BLOCK)? as u64);
        let name = self.utf(BLOCK)?;
        let probes = self.bool_array(BLOCK)?;

        Ok(ExecutionData::new(id, name, probes))
    }

    fn fill(&mut self, buf: &mut [u8], block: &'static str) -> Result<(), MalformedDumpError> {
        match self.input.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(self.malformed(MalformedKind::Truncated(block)))
            }
            Err(err) => Err(self.malformed(MalformedKind::Io(err))),
        }
    }

    fn u8(&mut self, block: &'static str) -> Result<u8, MalformedDumpError> {
        let mut buf = [0; 1];
        self.fill(&mut buf, block)?;
        Ok(buf[0])
    }

    fn u16(&mut self, block: &'static str) -> Result<u16, MalformedDumpError> {
        let mut buf = [0; 2];
        self.fill(&mut buf, block)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn i64(&mut self, block: &'static str) -> Result<i64, MalformedDumpError> {
        let mut buf = [0; 8];
        self.fill(&mut buf, block)?;
        Ok(i64::from_be_bytes(buf))
    }

    fn utf(&mut self, block: &'static str) -> Result<String, MalformedDumpError> {
        let len = self.u16(block)?;
        let mut buf = vec![0; usize::from(len)];
        self.fill(&mut buf, block)?;

        match mutf8::decode(&buf) {
            Some(text) => Ok(text.into_owned()),
            None => Err(self.malformed(MalformedKind::InvalidString(block))),
        }
    }

    /// Seven bits per byte, least significant group first.
    fn var_int(&mut self, block: &'static str) -> Result<u32, MalformedDumpError> {
        let mut value = 0u32;
        let mut shift = 0;

        loop {
            let byte = self.u8(block)?;

            if shift > 28 || (shift == 28 && byte & 0x70 != 0) {
                return Err(self.malformed(MalformedKind::InvalidProbeCount));
            }

            value |= u32::from(byte & 0x7f) << shift;

            if byte & 0x80 == 0 {
                return Ok(value);
            }

            shift += 7;
        }
    }

    fn bool_array(&mut self, block: &'static str) -> Result<FixedBitSet, MalformedDumpError> {
        let count = self.var_int(block)? as usize;
        let len = (count + 7) / 8;

        // Grows with the data actually present, not the declared count.
        let mut bytes = Vec::new();
        let result = Read::by_ref(&mut self.input)
            .take(len as u64)
            .read_to_end(&mut bytes);
        let read = result.map_err(|err| self.malformed(MalformedKind::Io(err)))?;
        self.offset += read as u64;

        if read < len {
            return Err(self.malformed(MalformedKind::Truncated(block)));
        }

        let mut probes = FixedBitSet::with_capacity(count);
        for index in 0..count {
            if bytes[index / 8] & (1 << (index % 8)) != 0 {
                probes.insert(index);
            }
        }

        Ok(probes)
    }
}

pub struct ExecutionDataWriter<W: Write> {
    output: W,
}

impl<W: Write> ExecutionDataWriter<W> {
    /// Start a payload by writing the header block.
    pub fn new(mut output: W) -> io::Result<Self> {
        output.write_all(&[BLOCK_HEADER])?;
        output.write_all(&MAGIC_NUMBER.to_be_bytes())?;
        output.write_all(&FORMAT_VERSION.to_be_bytes())?;

        Ok(Self { output })
    }

    pub fn write_session_info(&mut self, info: &SessionInfo) -> io::Result<()> {
        self.output.write_all(&[BLOCK_SESSION_INFO])?;
        self.write_utf(&info.id)?;
        self.output.write_all(&info.start.to_be_bytes())?;
        self.output.write_all(&info.dump.to_be_bytes())?;

        Ok(())
    }

    /// Classes without any hit probe are not written.
    pub fn write_execution_data(&mut self, data: &ExecutionData) -> io::Result<()> {
        if !data.has_hits() {
            return Ok(());
        }

        self.output.write_all(&[BLOCK_EXECUTION_DATA])?;
        self.output.write_all(&data.id.0.to_be_bytes())?;
        self.write_utf(&data.name)?;
        self.write_bool_array(&data.probes)?;

        Ok(())
    }

    pub fn write_dump(&mut self, dump: &ExecutionDataDump) -> io::Result<()> {
        self.write_session_info(&dump.session)?;

        for data in dump.store.entries.values() {
            self.write_execution_data(data)?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    fn write_utf(&mut self, text: &str) -> io::Result<()> {
        let encoded = mutf8::encode(text);

        let len = u16::try_from(encoded.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("string of {} bytes is too long to encode", encoded.len()),
            )
        })?;

        self.output.write_all(&len.to_be_bytes())?;
        self.output.write_all(&encoded)
    }

    fn write_var_int(&mut self, mut value: u32) -> io::Result<()> {
        while value & !0x7f != 0 {
            self.output.write_all(&[0x80 | (value & 0x7f) as u8])?;
            value >>= 7;
        }

        self.output.write_all(&[value as u8])
    }

    fn write_bool_array(&mut self, probes: &FixedBitSet) -> io::Result<()> {
        let count = u32::try_from(probes.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many probes"))?;
        self.write_var_int(count)?;

        let mut bytes = vec![0u8; (probes.len() + 7) / 8];
        for index in probes.ones() {
            bytes[index / 8] |= 1 << (index % 8);
        }

        self.output.write_all(&bytes)
    }
}
