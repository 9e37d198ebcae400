// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use phf::phf_map;

/// The standard reason phrases, consulted whenever a reason phrase is
/// omitted and the status code is a known one.
///
/// # References
/// * [RFC 9110 Section 15](https://httpwg.org/specs/rfc9110.html#status.codes)
/// * [IANA Hypertext Transfer Protocol (HTTP) Status Code Registry](https://www.iana.org/assignments/http-status-codes/http-status-codes.xhtml)
static REASON_PHRASES: phf::Map<u16, &'static str> = phf_map!(
    100u16 => "Continue",
    101u16 => "Switching Protocols",
    102u16 => "Processing",

    200u16 => "OK",
    201u16 => "Created",
    202u16 => "Accepted",
    203u16 => "Non-Authoritative Information",
    204u16 => "No Content",
    205u16 => "Reset Content",
    206u16 => "Partial Content",
    207u16 => "Multi-status",
    208u16 => "Already Reported",

    300u16 => "Multiple Choices",
    301u16 => "Moved Permanently",
    302u16 => "Found",
    303u16 => "See Other",
    304u16 => "Not Modified",
    305u16 => "Use Proxy",
    306u16 => "Switch Proxy",
    307u16 => "Temporary Redirect",
    308u16 => "Permanent Redirect",

    400u16 => "Bad Request",
    401u16 => "Unauthorized",
    402u16 => "Payment Required",
    403u16 => "Forbidden",
    404u16 => "Not Found",
    405u16 => "Method Not Allowed",
    406u16 => "Not Acceptable",
    407u16 => "Proxy Authentication Required",
    408u16 => "Request Time-out",
    409u16 => "Conflict",
    410u16 => "Gone",
    411u16 => "Length Required",
    412u16 => "Precondition Failed",
    413u16 => "Request Entity Too Large",
    414u16 => "Request-URI Too Large",
    415u16 => "Unsupported Media Type",
    416u16 => "Requested range not satisfiable",
    417u16 => "Expectation Failed",
    418u16 => "I'm a teapot",
    422u16 => "Unprocessable Entity",
    423u16 => "Locked",
    424u16 => "Failed Dependency",
    425u16 => "Unordered Collection",
    426u16 => "Upgrade Required",
    428u16 => "Precondition Required",
    429u16 => "Too Many Requests",
    431u16 => "Request Header Fields Too Large",
    451u16 => "Unavailable For Legal Reasons",

    500u16 => "Internal Server Error",
    501u16 => "Not Implemented",
    502u16 => "Bad Gateway",
    503u16 => "Service Unavailable",
    504u16 => "Gateway Time-out",
    505u16 => "HTTP Version not supported",
    506u16 => "Variant Also Negotiates",
    507u16 => "Insufficient Storage",
    508u16 => "Loop Detected",
    511u16 => "Network Authentication Required",
);

/// Looks up the standard reason phrase for a status code, if the code is a
/// known one.
#[must_use]
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    REASON_PHRASES.get(&code).copied()
}

/// Returns the class of a status code.
#[must_use]
pub fn status_class(code: u16) -> StatusClass {
    match code {
        100..=199 => StatusClass::Informational,
        200..=299 => StatusClass::Success,
        300..=399 => StatusClass::Redirection,
        400..=499 => StatusClass::ClientError,
        _ => StatusClass::ServerError,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100, Some("Continue"))]
    #[case(200, Some("OK"))]
    #[case(204, Some("No Content"))]
    #[case(404, Some("Not Found"))]
    #[case(408, Some("Request Time-out"))]
    #[case(511, Some("Network Authentication Required"))]
    #[case(567, None)]
    #[case(419, None)]
    fn test_reason_phrase(#[case] code: u16, #[case] expected: Option<&str>) {
        assert_eq!(reason_phrase(code), expected);
    }

    #[rstest]
    #[case(103, StatusClass::Informational)]
    #[case(226, StatusClass::Success)]
    #[case(308, StatusClass::Redirection)]
    #[case(451, StatusClass::ClientError)]
    #[case(599, StatusClass::ServerError)]
    fn test_status_class(#[case] code: u16, #[case] expected: StatusClass) {
        assert_eq!(status_class(code), expected);
    }
}
