// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use strum_macros::AsRefStr;

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{BodyStream, Error};

/// The upload error scale reported by the gateway alongside each uploaded
/// file. Anything but [`UploadErrorCode::Ok`] means there is no valid byte
/// source behind the descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, AsRefStr)]
pub enum UploadErrorCode {
    Ok,
    /// The file exceeds the server-side size limit.
    IniSize,
    /// The file exceeds the size limit declared in the form.
    FormSize,
    /// The file was only partially received.
    Partial,
    /// No file was submitted in this slot.
    NoFile,
    /// No temporary directory to receive the file.
    NoTmpDir,
    /// Writing the temporary file failed.
    CantWrite,
    /// An extension aborted the upload.
    Extension,
    Unknown(u8),
}

impl UploadErrorCode {
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::IniSize,
            2 => Self::FormSize,
            3 => Self::Partial,
            4 => Self::NoFile,
            6 => Self::NoTmpDir,
            7 => Self::CantWrite,
            8 => Self::Extension,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::IniSize => 1,
            Self::FormSize => 2,
            Self::Partial => 3,
            Self::NoFile => 4,
            Self::NoTmpDir => 6,
            Self::CantWrite => 7,
            Self::Extension => 8,
            Self::Unknown(code) => *code,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

enum UploadSource {
    Stream(BodyStream),
    Path(PathBuf),
    Moved,
}

/// A file received with the request.
///
/// Filename and media type come from the client and are advisory only.
/// The value walks a one-way `Pending → Moved` state machine: once moved,
/// neither the stream nor a second move is available.
pub struct UploadedFile {
    size: Option<u64>,
    error: UploadErrorCode,
    client_filename: Option<String>,
    client_media_type: Option<String>,
    source: RefCell<UploadSource>,
}

impl UploadedFile {
    #[must_use]
    pub fn from_stream(
        stream: BodyStream,
        size: Option<u64>,
        error: UploadErrorCode,
        client_filename: Option<String>,
        client_media_type: Option<String>,
    ) -> Self {
        Self {
            size,
            error,
            client_filename,
            client_media_type,
            source: RefCell::new(UploadSource::Stream(stream)),
        }
    }

    /// Binds a source-file path; the file is only opened when the stream is
    /// first requested or the upload is moved.
    #[must_use]
    pub fn from_path(
        path: impl Into<PathBuf>,
        size: Option<u64>,
        error: UploadErrorCode,
        client_filename: Option<String>,
        client_media_type: Option<String>,
    ) -> Self {
        Self {
            size,
            error,
            client_filename,
            client_media_type,
            source: RefCell::new(UploadSource::Path(path.into())),
        }
    }

    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    #[must_use]
    pub fn error(&self) -> UploadErrorCode {
        self.error
    }

    #[must_use]
    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    #[must_use]
    pub fn client_media_type(&self) -> Option<&str> {
        self.client_media_type.as_deref()
    }

    fn ensure_usable(&self) -> Result<(), Error> {
        if !self.error.is_ok() {
            return Err(Error::UploadFailed(self.error));
        }
        if matches!(*self.source.borrow(), UploadSource::Moved) {
            return Err(Error::UploadAlreadyMoved);
        }
        Ok(())
    }

    /// The byte source for the upload. For a path-bound upload this opens
    /// the source file.
    pub fn stream(&self) -> Result<BodyStream, Error> {
        self.ensure_usable()?;
        match &*self.source.borrow() {
            UploadSource::Stream(stream) => Ok(stream.clone()),
            UploadSource::Path(path) => Ok(BodyStream::from_file(fs::File::open(path)?)),
            UploadSource::Moved => Err(Error::UploadAlreadyMoved),
        }
    }

    /// Moves the upload to `target`. Terminal: a second move, or a stream
    /// request afterwards, fails with [`Error::UploadAlreadyMoved`].
    pub fn move_to(&self, target: impl AsRef<Path>) -> Result<(), Error> {
        let target = target.as_ref();
        if target.as_os_str().is_empty() {
            return Err(Error::InvalidMovePath);
        }
        self.ensure_usable()?;

        let source = std::mem::replace(&mut *self.source.borrow_mut(), UploadSource::Moved);
        let outcome = match &source {
            UploadSource::Path(path) => move_file(path, target),
            UploadSource::Stream(stream) => copy_stream_to(stream, target),
            UploadSource::Moved => return Err(Error::UploadAlreadyMoved),
        };

        if outcome.is_err() {
            // The source was not consumed; leave the upload usable.
            *self.source.borrow_mut() = source;
        }
        outcome
    }
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("size", &self.size)
            .field("error", &self.error)
            .field("client_filename", &self.client_filename)
            .field("client_media_type", &self.client_media_type)
            .finish_non_exhaustive()
    }
}

fn move_file(from: &Path, to: &Path) -> Result<(), Error> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    // Rename fails across filesystems; fall back to copy + remove.
    fs::copy(from, to)?;
    fs::remove_file(from)?;
    Ok(())
}

fn copy_stream_to(stream: &BodyStream, to: &Path) -> Result<(), Error> {
    if stream.is_seekable() {
        stream.rewind()?;
    }

    let mut file = fs::File::create(to)?;
    let mut buffer = [0u8; 8192];
    loop {
        let count = stream.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        file.write_all(&buffer[..count])?;
    }
    Ok(())
}

/// One field of an upload descriptor: a single value at a leaf, or a
/// parallel array mirroring the shape of the `tmp_name` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorValue<T> {
    One(T),
    Many(Vec<DescriptorValue<T>>),
}

impl<T: Clone> DescriptorValue<T> {
    fn scalar(&self) -> Option<T> {
        match self {
            Self::One(value) => Some(value.clone()),
            Self::Many(_) => None,
        }
    }

    fn at(&self, index: usize) -> Option<&DescriptorValue<T>> {
        match self {
            Self::One(_) => None,
            Self::Many(values) => values.get(index),
        }
    }
}

impl<T> From<T> for DescriptorValue<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}

/// A raw upload descriptor as delivered by the gateway: flat keys for a
/// single file, or each key holding identically indexed arrays for a group
/// of files under one field name.
#[derive(Clone, Debug)]
pub struct UploadDescriptor {
    pub tmp_name: DescriptorValue<String>,
    pub name: Option<DescriptorValue<String>>,
    pub media_type: Option<DescriptorValue<String>>,
    pub size: Option<DescriptorValue<u64>>,
    pub error: Option<DescriptorValue<u8>>,
}

impl UploadDescriptor {
    #[must_use]
    pub fn new(tmp_name: impl Into<DescriptorValue<String>>) -> Self {
        Self {
            tmp_name: tmp_name.into(),
            name: None,
            media_type: None,
            size: None,
            error: None,
        }
    }
}

/// The descriptor structure under one field name: a leaf descriptor or a
/// named nesting of further descriptors.
#[derive(Clone, Debug)]
pub enum DescriptorTree {
    Leaf(UploadDescriptor),
    Map(Vec<(String, DescriptorTree)>),
}

/// The normalized counterpart of [`DescriptorTree`], mirroring its shape
/// with each leaf descriptor replaced by a bound [`UploadedFile`].
#[derive(Debug)]
pub enum UploadedFileNode {
    File(UploadedFile),
    List(Vec<UploadedFileNode>),
    Map(Vec<(String, UploadedFileNode)>),
}

impl UploadedFileNode {
    #[must_use]
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[UploadedFileNode]> {
        match self {
            Self::List(nodes) => Some(nodes),
            _ => None,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&UploadedFileNode> {
        match self {
            Self::Map(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, node)| node),
            _ => None,
        }
    }
}

/// Walks a descriptor map, preserving its shape and replacing each leaf
/// with an [`UploadedFile`]. Descriptors in an error state still produce a
/// file value, so callers can inspect why a slot failed.
#[must_use]
pub fn normalize_uploads(files: Vec<(String, DescriptorTree)>) -> Vec<(String, UploadedFileNode)> {
    files
        .into_iter()
        .map(|(name, tree)| (name, normalize_tree(&tree)))
        .collect()
}

fn normalize_tree(tree: &DescriptorTree) -> UploadedFileNode {
    match tree {
        DescriptorTree::Leaf(descriptor) => normalize_descriptor(descriptor),
        DescriptorTree::Map(entries) => UploadedFileNode::Map(
            entries
                .iter()
                .map(|(name, subtree)| (name.clone(), normalize_tree(subtree)))
                .collect(),
        ),
    }
}

fn normalize_descriptor(descriptor: &UploadDescriptor) -> UploadedFileNode {
    match &descriptor.tmp_name {
        DescriptorValue::One(tmp_name) => UploadedFileNode::File(UploadedFile::from_path(
            tmp_name.clone(),
            descriptor.size.as_ref().and_then(DescriptorValue::scalar),
            UploadErrorCode::from_code(
                descriptor.error.as_ref().and_then(DescriptorValue::scalar).unwrap_or(0),
            ),
            descriptor.name.as_ref().and_then(DescriptorValue::scalar),
            descriptor.media_type.as_ref().and_then(DescriptorValue::scalar),
        )),
        DescriptorValue::Many(entries) => UploadedFileNode::List(
            (0..entries.len())
                .map(|index| {
                    let slot = UploadDescriptor {
                        tmp_name: entries[index].clone(),
                        name: field_at(&descriptor.name, index),
                        media_type: field_at(&descriptor.media_type, index),
                        size: field_at(&descriptor.size, index),
                        error: field_at(&descriptor.error, index),
                    };
                    normalize_descriptor(&slot)
                })
                .collect(),
        ),
    }
}

fn field_at<T: Clone>(field: &Option<DescriptorValue<T>>, index: usize) -> Option<DescriptorValue<T>> {
    field.as_ref().and_then(|value| value.at(index)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("messaggero-upload-{name}-{}", std::process::id()));
        path
    }

    #[test]
    fn test_stream_returns_the_original_handle() {
        let stream = BodyStream::from_text("Foo bar!");
        let upload = UploadedFile::from_stream(stream.clone(), Some(8), UploadErrorCode::Ok, None, None);
        assert!(upload.stream().unwrap().ptr_eq(&stream));
    }

    #[test]
    fn test_successful_upload_metadata() {
        let stream = BodyStream::from_text("Foo bar!");
        let upload = UploadedFile::from_stream(
            stream,
            Some(8),
            UploadErrorCode::Ok,
            Some("filename.txt".to_string()),
            Some("text/plain".to_string()),
        );

        assert_eq!(upload.size(), Some(8));
        assert_eq!(upload.client_filename(), Some("filename.txt"));
        assert_eq!(upload.client_media_type(), Some("text/plain"));
    }

    #[test]
    fn test_move_writes_the_stream_and_is_terminal() {
        let target = temp_path("move-once");
        let upload = UploadedFile::from_stream(
            BodyStream::from_text("Foo bar!"),
            Some(8),
            UploadErrorCode::Ok,
            None,
            None,
        );

        upload.move_to(&target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "Foo bar!");

        assert!(matches!(upload.move_to(&target), Err(Error::UploadAlreadyMoved)));
        assert!(matches!(upload.stream(), Err(Error::UploadAlreadyMoved)));
        fs::remove_file(&target).unwrap();
    }

    #[test]
    fn test_move_from_path_relocates_the_file() {
        let from = temp_path("move-from");
        let to = temp_path("move-to");
        fs::write(&from, "contents").unwrap();

        let upload = UploadedFile::from_path(&from, Some(8), UploadErrorCode::Ok, None, None);
        upload.move_to(&to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "contents");
        fs::remove_file(&to).unwrap();
    }

    #[test]
    fn test_empty_move_target_is_invalid() {
        let upload = UploadedFile::from_stream(BodyStream::empty(), None, UploadErrorCode::Ok, None, None);
        assert!(matches!(upload.move_to(""), Err(Error::InvalidMovePath)));
    }

    #[rstest]
    #[case(UploadErrorCode::IniSize)]
    #[case(UploadErrorCode::FormSize)]
    #[case(UploadErrorCode::Partial)]
    #[case(UploadErrorCode::NoFile)]
    #[case(UploadErrorCode::NoTmpDir)]
    #[case(UploadErrorCode::CantWrite)]
    #[case(UploadErrorCode::Extension)]
    fn test_error_state_blocks_stream_and_move(#[case] error: UploadErrorCode) {
        let upload = UploadedFile::from_path("not ok", Some(0), error, None, None);
        assert_eq!(upload.error(), error);
        assert!(matches!(upload.stream(), Err(Error::UploadFailed(_))));
        assert!(matches!(upload.move_to("/tmp/nope"), Err(Error::UploadFailed(_))));
    }

    #[rstest]
    #[case(0, UploadErrorCode::Ok)]
    #[case(4, UploadErrorCode::NoFile)]
    #[case(5, UploadErrorCode::Unknown(5))]
    #[case(9, UploadErrorCode::Unknown(9))]
    fn test_error_code_round_trip(#[case] code: u8, #[case] expected: UploadErrorCode) {
        assert_eq!(UploadErrorCode::from_code(code), expected);
        assert_eq!(expected.code(), code);
    }

    #[test]
    fn test_normalize_flat_descriptor() {
        let mut descriptor = UploadDescriptor::new("/tmp/php123".to_string());
        descriptor.name = Some("avatar.jpg".to_string().into());
        descriptor.media_type = Some("image/jpeg".to_string().into());
        descriptor.size = Some(512u64.into());
        descriptor.error = Some(0u8.into());

        let files = normalize_uploads(vec![("avatar".to_string(), DescriptorTree::Leaf(descriptor))]);
        let (name, node) = &files[0];
        assert_eq!(name, "avatar");
        let file = node.as_file().unwrap();
        assert_eq!(file.client_filename(), Some("avatar.jpg"));
        assert_eq!(file.size(), Some(512));
    }

    #[test]
    fn test_normalize_parallel_array_group() {
        let descriptor = UploadDescriptor {
            tmp_name: DescriptorValue::Many(vec![
                "/tmp/a".to_string().into(),
                "/tmp/b".to_string().into(),
            ]),
            name: Some(DescriptorValue::Many(vec![
                "file1.txt".to_string().into(),
                "file2.txt".to_string().into(),
            ])),
            media_type: Some(DescriptorValue::Many(vec![
                "text/plain".to_string().into(),
                "text/plain".to_string().into(),
            ])),
            size: Some(DescriptorValue::Many(vec![3u64.into(), 4u64.into()])),
            error: Some(DescriptorValue::Many(vec![0u8.into(), 0u8.into()])),
        };

        let files = normalize_uploads(vec![("files".to_string(), DescriptorTree::Leaf(descriptor))]);
        let list = files[0].1.as_list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].as_file().unwrap().client_filename(), Some("file1.txt"));
        assert_eq!(list[1].as_file().unwrap().client_filename(), Some("file2.txt"));
        assert_eq!(list[1].as_file().unwrap().size(), Some(4));
    }

    #[test]
    fn test_normalize_keeps_errored_slots() {
        let mut descriptor = UploadDescriptor::new("".to_string());
        descriptor.name = Some("avatar.jpg".to_string().into());
        descriptor.error = Some(4u8.into());

        let files = normalize_uploads(vec![("avatar".to_string(), DescriptorTree::Leaf(descriptor))]);
        let file = files[0].1.as_file().unwrap();
        assert_eq!(file.error(), UploadErrorCode::NoFile);
    }

    #[test]
    fn test_normalize_named_nesting() {
        let tree = DescriptorTree::Map(vec![(
            "inner".to_string(),
            DescriptorTree::Leaf(UploadDescriptor::new("/tmp/x".to_string())),
        )]);

        let files = normalize_uploads(vec![("outer".to_string(), tree)]);
        let inner = files[0].1.get("inner").unwrap();
        assert!(inner.as_file().is_some());
    }
}
