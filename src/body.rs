// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

/// The byte source behind a [`BodyStream`].
enum BodySource {
    /// In-memory buffer: readable, writable, seekable, known size.
    Buffer(Cursor<Vec<u8>>),
    /// An externally opened file: readable, seekable, size from metadata.
    File(fs::File),
    /// An arbitrary reader: not seekable, unknown size.
    Reader(Box<dyn Read>),
}

/// A byte sequence with position state, bound to a message.
///
/// The handle is cheap to clone and shares the underlying source and its
/// read cursor; identity is exposed through [`BodyStream::ptr_eq`] so the
/// message layer can detect "same stream". The handle is intentionally not
/// `Send`: the stream carries consumption state and is owned by a single
/// holder at a time.
#[derive(Clone)]
pub struct BodyStream {
    source: Rc<RefCell<BodySource>>,
}

impl BodyStream {
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_bytes(text.into().into_bytes())
    }

    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::wrap(BodySource::Buffer(Cursor::new(bytes)))
    }

    /// Wraps an already-open file without copying it.
    #[must_use]
    pub fn from_file(file: fs::File) -> Self {
        Self::wrap(BodySource::File(file))
    }

    /// Wraps an arbitrary reader. The result is not seekable and reports an
    /// unknown size; stringifying it returns only what remains unread.
    #[must_use]
    pub fn from_reader(reader: Box<dyn Read>) -> Self {
        Self::wrap(BodySource::Reader(reader))
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::from_bytes(Vec::new())
    }

    fn wrap(source: BodySource) -> Self {
        Self { source: Rc::new(RefCell::new(source)) }
    }

    /// Whether `self` and `other` are handles to the same underlying
    /// source.
    #[must_use]
    pub fn ptr_eq(&self, other: &BodyStream) -> bool {
        Rc::ptr_eq(&self.source, &other.source)
    }

    #[must_use]
    pub fn is_seekable(&self) -> bool {
        !matches!(*self.source.borrow(), BodySource::Reader(_))
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        matches!(*self.source.borrow(), BodySource::Buffer(_) | BodySource::File(_))
    }

    /// Total size in bytes, when the source knows it.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        match &*self.source.borrow() {
            BodySource::Buffer(cursor) => Some(cursor.get_ref().len() as u64),
            BodySource::File(file) => file.metadata().ok().map(|metadata| metadata.len()),
            BodySource::Reader(_) => None,
        }
    }

    pub fn seek(&self, position: SeekFrom) -> io::Result<u64> {
        match &mut *self.source.borrow_mut() {
            BodySource::Buffer(cursor) => cursor.seek(position),
            BodySource::File(file) => file.seek(position),
            BodySource::Reader(_) => Err(io::Error::new(io::ErrorKind::Unsupported, "stream is not seekable")),
        }
    }

    pub fn rewind(&self) -> io::Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    pub fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        match &mut *self.source.borrow_mut() {
            BodySource::Buffer(cursor) => cursor.read(buffer),
            BodySource::File(file) => file.read(buffer),
            BodySource::Reader(reader) => reader.read(buffer),
        }
    }

    pub fn write(&self, buffer: &[u8]) -> io::Result<usize> {
        match &mut *self.source.borrow_mut() {
            BodySource::Buffer(cursor) => cursor.write(buffer),
            BodySource::File(file) => file.write(buffer),
            BodySource::Reader(_) => Err(io::Error::new(io::ErrorKind::Unsupported, "stream is not writable")),
        }
    }

    /// Reads the stream to its end, rewinding to position 0 first when the
    /// source is seekable. A non-seekable source yields only what remains
    /// unread. Non-UTF-8 bytes are replaced.
    pub fn contents(&self) -> io::Result<String> {
        if self.is_seekable() {
            self.rewind()?;
        }

        let mut bytes = Vec::new();
        match &mut *self.source.borrow_mut() {
            BodySource::Buffer(cursor) => cursor.read_to_end(&mut bytes)?,
            BodySource::File(file) => file.read_to_end(&mut bytes)?,
            BodySource::Reader(reader) => reader.read_to_end(&mut bytes)?,
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &*self.source.borrow() {
            BodySource::Buffer(cursor) => format!("Buffer({} bytes)", cursor.get_ref().len()),
            BodySource::File(_) => "File".to_string(),
            BodySource::Reader(_) => "Reader".to_string(),
        };
        f.debug_tuple("BodyStream").field(&kind).finish()
    }
}

impl fmt::Display for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.contents().unwrap_or_default())
    }
}

/// The accepted shapes of a raw body at the construction boundary, a
/// closed union resolved before the internal stream is built.
#[derive(Debug, Default)]
pub enum BodyInput {
    Text(String),
    Bytes(Vec<u8>),
    /// An externally opened handle, wrapped without copying.
    File(fs::File),
    /// An existing stream, transferred rather than duplicated.
    Stream(BodyStream),
    /// No body; stream creation is deferred to first access.
    #[default]
    Absent,
}

impl BodyInput {
    /// Resolves the input to a stream, or `None` for [`BodyInput::Absent`].
    #[must_use]
    pub fn into_stream(self) -> Option<BodyStream> {
        match self {
            BodyInput::Text(text) => Some(BodyStream::from_text(text)),
            BodyInput::Bytes(bytes) => Some(BodyStream::from_bytes(bytes)),
            BodyInput::File(file) => Some(BodyStream::from_file(file)),
            BodyInput::Stream(stream) => Some(stream),
            BodyInput::Absent => None,
        }
    }
}

impl From<&str> for BodyInput {
    fn from(value: &str) -> Self {
        BodyInput::Text(value.to_string())
    }
}

impl From<String> for BodyInput {
    fn from(value: String) -> Self {
        BodyInput::Text(value)
    }
}

impl From<Vec<u8>> for BodyInput {
    fn from(value: Vec<u8>) -> Self {
        BodyInput::Bytes(value)
    }
}

impl From<fs::File> for BodyInput {
    fn from(value: fs::File) -> Self {
        BodyInput::File(value)
    }
}

impl From<BodyStream> for BodyInput {
    fn from(value: BodyStream) -> Self {
        BodyInput::Stream(value)
    }
}
