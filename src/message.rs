// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::cell::OnceCell;
use std::rc::Rc;

use crate::{syntax, BodyStream, Error, HeaderStore, HeaderValues};

/// The state every message variant shares: protocol version, headers, body.
///
/// The body cell stays empty until first access, so a bodyless request
/// (e.g. GET) never allocates a stream.
#[derive(Clone, Debug)]
pub struct MessageParts {
    pub(crate) version: String,
    pub(crate) headers: Rc<HeaderStore>,
    pub(crate) body: OnceCell<BodyStream>,
}

impl MessageParts {
    pub(crate) fn new(version: &str, headers: HeaderStore, body: Option<BodyStream>) -> Self {
        let cell = OnceCell::new();
        if let Some(stream) = body {
            // A fresh cell cannot already be set.
            let _ = cell.set(stream);
        }
        Self {
            version: version.to_string(),
            headers: Rc::new(headers),
            body: cell,
        }
    }

    pub(crate) fn body(&self) -> BodyStream {
        self.body.get_or_init(BodyStream::empty).clone()
    }
}

impl Default for MessageParts {
    fn default() -> Self {
        Self::new("1.1", HeaderStore::new(), None)
    }
}

/// The immutable mutation protocol shared by [`Request`], [`Response`] and
/// [`ServerRequest`].
///
/// Every `with_*` consumes the receiver and returns a new value; a no-op
/// change (equal version, identical stream, removing an absent header)
/// hands the receiver back unchanged, so callers can detect "nothing
/// changed" through handle identity (e.g. [`BodyStream::ptr_eq`]).
///
/// [`Request`]: crate::Request
/// [`Response`]: crate::Response
/// [`ServerRequest`]: crate::ServerRequest
pub trait Message: Clone + Sized {
    fn parts(&self) -> &MessageParts;
    fn parts_mut(&mut self) -> &mut MessageParts;

    fn protocol_version(&self) -> &str {
        &self.parts().version
    }

    fn headers(&self) -> &HeaderStore {
        &self.parts().headers
    }

    fn header(&self, name: &str) -> &[String] {
        self.parts().headers.get(name)
    }

    fn header_line(&self, name: &str) -> String {
        self.parts().headers.line(name)
    }

    fn has_header(&self, name: &str) -> bool {
        self.parts().headers.contains(name)
    }

    /// The body stream, binding an empty in-memory stream on first access
    /// when the message was constructed without one.
    fn body(&self) -> BodyStream {
        self.parts().body()
    }

    fn with_protocol_version(self, version: &str) -> Result<Self, Error> {
        syntax::validate_token(version).map_err(Error::InvalidProtocolVersion)?;
        if version == self.parts().version {
            return Ok(self);
        }

        let mut new = self;
        new.parts_mut().version = version.to_string();
        Ok(new)
    }

    fn with_header(self, name: &str, values: impl Into<HeaderValues>) -> Result<Self, Error> {
        let headers = self.parts().headers.set(name, values)?;
        Ok(self.replace_headers(headers))
    }

    fn with_added_header(self, name: &str, values: impl Into<HeaderValues>) -> Result<Self, Error> {
        let headers = self.parts().headers.add(name, values)?;
        Ok(self.replace_headers(headers))
    }

    fn without_header(self, name: &str) -> Self {
        if !self.parts().headers.contains(name) {
            return self;
        }

        let headers = self.parts().headers.remove(name);
        self.replace_headers(headers)
    }

    /// Binds a new stream, sharing nothing with the previous binding. The
    /// same stream (handle identity) is a no-op.
    fn with_body(self, stream: BodyStream) -> Self {
        if let Some(current) = self.parts().body.get() {
            if current.ptr_eq(&stream) {
                return self;
            }
        }

        let mut new = self;
        new.parts_mut().body = OnceCell::from(stream);
        new
    }

    #[doc(hidden)]
    fn replace_headers(self, headers: HeaderStore) -> Self {
        let mut new = self;
        new.parts_mut().headers = Rc::new(headers);
        new
    }
}
