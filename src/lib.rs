// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Immutable HTTP message values and the plumbing around them: validated
//! header storage, lazily-bound body streams, request/response types with
//! a copy-on-write mutation protocol, media-type body parsing, uploaded
//! files and the reconstruction of an inbound request from gateway
//! variables.

pub mod body;
pub mod emitter;
pub mod environment;
pub mod error;
pub mod form;
pub mod header_store;
pub mod media_type;
pub mod message;
pub mod method;
pub mod request;
pub mod response;
pub mod server_request;
pub mod status;
pub mod syntax;
pub mod uploaded_file;
pub mod uri;

pub use body::*;
pub use emitter::*;
pub use environment::*;
pub use error::*;
pub use header_store::*;
pub use media_type::*;
pub use message::*;
pub use method::*;
pub use request::*;
pub use response::*;
pub use server_request::*;
pub use status::*;
pub use uploaded_file::*;
pub use uri::*;
