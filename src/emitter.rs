// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::io::{self, Write};

use crate::{status, Message, Response};

const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Serializes a [`Response`] onto a byte sink: status line, one line per
/// header value, and the body in fixed-size chunks.
#[derive(Clone, Debug)]
pub struct Emitter {
    chunk_size: usize,
}

impl Default for Emitter {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

impl Emitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn emit(&self, response: &Response, output: &mut impl Write) -> io::Result<()> {
        self.emit_head(response, output)?;
        if body_is_allowed(response.status()) {
            self.emit_body(response, output)?;
        }
        output.flush()
    }

    fn emit_head(&self, response: &Response, output: &mut impl Write) -> io::Result<()> {
        let reason = response.reason_phrase();
        if reason.is_empty() {
            write!(output, "HTTP/{} {}\r\n", response.protocol_version(), response.status())?;
        } else {
            write!(
                output,
                "HTTP/{} {} {}\r\n",
                response.protocol_version(),
                response.status(),
                reason
            )?;
        }

        for (name, values) in response.headers().iter() {
            for value in values {
                write!(output, "{name}: {value}\r\n")?;
            }
        }
        write!(output, "\r\n")
    }

    fn emit_body(&self, response: &Response, output: &mut impl Write) -> io::Result<()> {
        let body = response.body();
        if body.is_seekable() {
            body.rewind()?;
        }

        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let count = body.read(&mut buffer)?;
            if count == 0 {
                return Ok(());
            }
            output.write_all(&buffer[..count])?;
        }
    }
}

/// Informational responses and the bodyless success/redirect statuses
/// never carry a payload on the wire.
fn body_is_allowed(code: u16) -> bool {
    !matches!(status::status_class(code), status::StatusClass::Informational)
        && code != 204
        && code != 304
}
