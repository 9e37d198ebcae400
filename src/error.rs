// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use strum_macros::AsRefStr;

use std::fmt;
use std::io;

use crate::UploadErrorCode;

/// A grammar violation in a header name, header value or other field token.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr)]
pub enum GrammarError {
    TokenEmpty,
    TokenContainsWhitespace,
    TokenContainsDelimiter,
    TokenContainsNonVisibleAscii,

    FieldValueContainsInvalidCharacters,
}

/// Every failure this crate can surface. All failures are synchronous and
/// terminal to the operation that raised them; no partially-mutated message
/// is ever observable, because mutation only happens by producing a new
/// instance after validation succeeds.
#[derive(Debug, AsRefStr)]
pub enum Error {
    /// The header name failed the token grammar.
    InvalidHeaderName(GrammarError),

    /// A header value failed the field-value grammar.
    InvalidHeaderValue(GrammarError),

    /// A header was set with an empty value list.
    EmptyHeaderValueList,

    /// A status code outside the 100..=599 range was passed to a mutator.
    InvalidStatusCode(u16),

    /// A redirect was constructed with a status outside {301, 302, 303, 307,
    /// 308}.
    InvalidRedirectStatus(u16),

    /// The protocol version is empty or not a token.
    InvalidProtocolVersion(GrammarError),

    /// The method token is empty or malformed.
    InvalidMethod(GrammarError),

    /// The move target for an uploaded file is empty.
    InvalidMovePath,

    /// The uploaded file was already moved; neither its stream nor a second
    /// move is available.
    UploadAlreadyMoved,

    /// The upload failed at the source; the descriptor carried a non-ok
    /// error code and there is no valid byte source behind it.
    UploadFailed(UploadErrorCode),

    /// A JSON payload handed to [`Response::json`] did not parse.
    ///
    /// [`Response::json`]: crate::Response::json
    MalformedJson,

    /// The body exceeded the configured size cap before decoding was even
    /// attempted.
    PayloadTooLarge {
        size: usize,
        limit: usize,
    },

    /// A registered body parser returned a scalar. Parsers must return a
    /// map, a list, or nothing.
    UnexpectedParserResult,

    /// The server variables carried no `REQUEST_METHOD`; no request can be
    /// reconstructed without one.
    MissingMethod,

    /// An I/O failure while reading, copying or moving a byte source.
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHeaderName(reason) => write!(f, "header name must be an RFC 7230 compatible token: {}", reason.as_ref()),
            Error::InvalidHeaderValue(reason) => write!(f, "header values must be RFC 7230 compatible strings: {}", reason.as_ref()),
            Error::EmptyHeaderValueList => f.write_str("header values must be a string or a list of strings, an empty list was given"),
            Error::InvalidStatusCode(code) => write!(f, "status code has to be an integer between 100 and 599, {code} was given"),
            Error::InvalidRedirectStatus(code) => write!(f, "the redirect status code must be one of 301, 302, 303, 307, 308, {code} was given"),
            Error::InvalidProtocolVersion(reason) => write!(f, "protocol version must be a non-empty token: {}", reason.as_ref()),
            Error::InvalidMethod(reason) => write!(f, "method must be a non-empty token: {}", reason.as_ref()),
            Error::InvalidMovePath => f.write_str("the move target path must be a non-empty string"),
            Error::UploadAlreadyMoved => f.write_str("the uploaded file was already moved"),
            Error::UploadFailed(code) => write!(f, "cannot use the uploaded file due to upload error: {}", code.as_ref()),
            Error::MalformedJson => f.write_str("invalid JSON payload"),
            Error::PayloadTooLarge { size, limit } => write!(f, "payload of {size} bytes exceeds the configured limit of {limit} bytes"),
            Error::UnexpectedParserResult => f.write_str("body parser return value must be a map, a list, or absent"),
            Error::MissingMethod => f.write_str("cannot determine HTTP method"),
            Error::Io(error) => write!(f, "i/o error: {error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(error) => Some(error),
            _ => None,
        }
    }
}
