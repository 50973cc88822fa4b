use nom::bytes::streaming::{tag, take, take_till, take_until};
use nom::combinator::{map, opt};
use nom::multi::many0;
use nom::sequence::{preceded, terminated};
use nom::IResult;

use bytes::{BufMut, BytesMut};

/// A raw inbound frame, borrowing from the read buffer.
#[derive(Debug, PartialEq)]
pub(crate) struct Frame<'a> {
    command: &'a [u8],
    headers: Vec<(&'a [u8], &'a [u8])>,
    body: Option<&'a [u8]>,
}

/// An outbound frame with the full, ordered header list the caller chose.
///
/// Header order is preserved on the wire; library-chosen headers (`receipt`,
/// `content-length`) are prepended by the connection layer before the frame
/// reaches the serializer.
#[derive(Debug, Clone)]
pub(crate) struct ClientFrame {
    pub command: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl ClientFrame {
    /// Wire format: command, `\n`, `name: value\n` per header, a blank line,
    /// the body, then `\0\n`. The `\0\n` terminator is acceptable to peers of
    /// either terminator convention.
    pub(crate) fn serialize(&self, buffer: &mut BytesMut) {
        let requires = self.command.len()
            + self.body.as_ref().map(|b| b.len()).unwrap_or(0)
            + self
                .headers
                .iter()
                .fold(0, |acc, (k, v)| acc + k.len() + v.len() + 3)
            + 4;
        if buffer.remaining_mut() < requires {
            buffer.reserve(requires);
        }
        buffer.put_slice(self.command.as_bytes());
        buffer.put_u8(b'\n');
        for (name, value) in &self.headers {
            buffer.put_slice(name.as_bytes());
            buffer.put_slice(b": ");
            buffer.put_slice(value.as_bytes());
            buffer.put_u8(b'\n');
        }
        buffer.put_u8(b'\n');
        if let Some(body) = &self.body {
            buffer.put_slice(body);
        }
        buffer.put_slice(b"\x00\n");
    }
}

// Nom definitions

fn eol(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(opt(tag("\r")), tag("\n"))(input)
}

fn line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    map(terminated(take_until("\n"), tag("\n")), strip_cr)(input)
}

fn parse_header(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    let (input, name) = take_till(|b| b == b':' || b == b'\n')(input)?;
    let (input, value) = preceded(tag(":"), line)(input)?;
    Ok((input, (name, value)))
}

fn content_length(headers: &[(&[u8], &[u8])]) -> Option<usize> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(b"content-length"))
        .and_then(|(_, value)| std::str::from_utf8(value).ok())
        .and_then(|value| value.trim().parse().ok())
}

fn non_empty(s: &[u8]) -> Option<&[u8]> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn strip_cr(buf: &[u8]) -> &[u8] {
    if let Some(&b'\r') = buf.last() {
        &buf[..buf.len() - 1]
    } else {
        buf
    }
}

/// Parse one frame. Blank lines before the command are skipped. The body is
/// sized by `content-length` when present, otherwise scanned to the first
/// `\0`. One terminator byte is then consumed without inspection; when
/// `eof_nl` is set a whole trailing line is consumed after it.
///
/// Returns `Err(nom::Err::Incomplete)` until the buffer holds a full frame.
pub(crate) fn parse_frame(input: &[u8], eof_nl: bool) -> IResult<&[u8], Frame<'_>> {
    let (input, _) = many0(eol)(input)?;
    let (input, command) = line(input)?;
    let (input, headers) = many0(parse_header)(input)?;
    let (input, _) = eol(input)?;
    let (input, body) = match content_length(&headers) {
        Some(n) => map(take(n), Some)(input)?,
        None => map(take_until("\x00"), non_empty)(input)?,
    };
    let (input, _) = take(1usize)(input)?;
    let input = if eof_nl { line(input)?.0 } else { input };
    Ok((input, Frame { command, headers, body }))
}

/// An owned, typed server frame. Header names are lowercased and values
/// stripped of surrounding whitespace; duplicates are preserved.
#[derive(Debug, Clone)]
pub(crate) enum ServerFrame {
    Connected {
        headers: Vec<(String, String)>,
    },
    Message {
        message_id: Option<String>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    Receipt {
        receipt_id: Option<String>,
        headers: Vec<(String, String)>,
    },
    Error {
        message: Option<String>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    Unknown {
        command: String,
        headers: Vec<(String, String)>,
    },
}

fn fetch_header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.clone())
}

impl Frame<'_> {
    pub(crate) fn to_server_frame(&self) -> ServerFrame {
        let headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    String::from_utf8_lossy(name).to_lowercase(),
                    String::from_utf8_lossy(value).trim().to_string(),
                )
            })
            .collect();
        let body = self.body.unwrap_or_default().to_vec();
        if self.command.eq_ignore_ascii_case(b"CONNECTED") {
            ServerFrame::Connected { headers }
        } else if self.command.eq_ignore_ascii_case(b"MESSAGE") {
            let message_id = fetch_header(&headers, "message-id");
            ServerFrame::Message {
                message_id,
                headers,
                body,
            }
        } else if self.command.eq_ignore_ascii_case(b"RECEIPT") {
            let receipt_id = fetch_header(&headers, "receipt-id");
            ServerFrame::Receipt {
                receipt_id,
                headers,
            }
        } else if self.command.eq_ignore_ascii_case(b"ERROR") {
            let message = fetch_header(&headers, "message");
            ServerFrame::Error {
                message,
                headers,
                body,
            }
        } else {
            ServerFrame::Unknown {
                command: String::from_utf8_lossy(self.command).into_owned(),
                headers,
            }
        }
    }
}

impl ServerFrame {
    /// Short rendering for error reports and trace events.
    pub(crate) fn describe(&self) -> String {
        match self {
            ServerFrame::Connected { .. } => "CONNECTED".into(),
            ServerFrame::Message { message_id, .. } => format!(
                "MESSAGE (message-id: {})",
                message_id.as_deref().unwrap_or("<missing>")
            ),
            ServerFrame::Receipt { receipt_id, .. } => format!(
                "RECEIPT (receipt-id: {})",
                receipt_id.as_deref().unwrap_or("<missing>")
            ),
            ServerFrame::Error { message, .. } => format!(
                "ERROR (message: {})",
                message.as_deref().unwrap_or("<none>")
            ),
            ServerFrame::Unknown { command, .. } => command.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialized(frame: &ClientFrame) -> Vec<u8> {
        let mut buffer = BytesMut::new();
        frame.serialize(&mut buffer);
        buffer.to_vec()
    }

    #[test]
    fn serialize_connect() {
        let frame = ClientFrame {
            command: "CONNECT",
            headers: vec![
                ("login".into(), "u".into()),
                ("passcode".into(), "p".into()),
            ],
            body: None,
        };
        assert_eq!(serialized(&frame), b"CONNECT\nlogin: u\npasscode: p\n\n\x00\n");
    }

    #[test]
    fn serialize_send_with_body() {
        let frame = ClientFrame {
            command: "SEND",
            headers: vec![
                ("receipt".into(), "receipt-2".into()),
                ("content-length".into(), "2".into()),
                ("destination".into(), "q1".into()),
                ("persistent".into(), "true".into()),
            ],
            body: Some(b"hi".to_vec()),
        };
        assert_eq!(
            serialized(&frame),
            b"SEND\nreceipt: receipt-2\ncontent-length: 2\ndestination: q1\npersistent: true\n\nhi\x00\n"
        );
    }

    #[test]
    fn parse_connected_with_trailing_newline() {
        let data = b"CONNECTED\n\n\x00\n";
        let (rest, frame) = parse_frame(data, true).unwrap();
        assert!(rest.is_empty());
        assert_eq!(frame.command, b"CONNECTED");
        assert!(frame.headers.is_empty());
        assert_eq!(frame.body, None);
    }

    #[test]
    fn parse_bare_nul_terminator() {
        let data = b"RECEIPT\nreceipt-id:receipt-2\n\n\x00RECEIPT\n";
        let (rest, frame) = parse_frame(data, false).unwrap();
        assert_eq!(rest, b"RECEIPT\n");
        assert_eq!(frame.command, b"RECEIPT");
        assert_eq!(frame.headers, vec![(&b"receipt-id"[..], &b"receipt-2"[..])]);
    }

    #[test]
    fn parse_body_with_content_length() {
        let body = "contains \x00 nulls \n and newlines \x00 OK?";
        let data = format!("MESSAGE\nmessage-id: m1\ncontent-length: {}\n\n{}\x00\n", body.len(), body);
        let (rest, frame) = parse_frame(data.as_bytes(), true).unwrap();
        assert!(rest.is_empty());
        assert_eq!(frame.body, Some(body.as_bytes()));
    }

    #[test]
    fn parse_body_scans_to_nul_without_content_length() {
        let data = b"MESSAGE\nmessage-id:m1\n\nhello\nworld\x00\n";
        let (rest, frame) = parse_frame(data, true).unwrap();
        assert!(rest.is_empty());
        assert_eq!(frame.body, Some(&b"hello\nworld"[..]));
    }

    #[test]
    fn parse_skips_leading_blank_lines() {
        let data = b"\n\nMESSAGE\nmessage-id:m1\n\nhi\x00\n";
        let (_, frame) = parse_frame(data, true).unwrap();
        assert_eq!(frame.command, b"MESSAGE");
    }

    #[test]
    fn incomplete_input_is_not_an_error() {
        for data in [
            &b"MESS"[..],
            b"MESSAGE\nmessage-id:m1",
            b"MESSAGE\nmessage-id:m1\n\nhi",
            // eof_nl frames are incomplete until the trailing line arrives
            b"MESSAGE\nmessage-id:m1\n\nhi\x00",
        ] {
            match parse_frame(data, true) {
                Err(nom::Err::Incomplete(_)) => {}
                other => panic!("expected Incomplete for {data:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn header_names_lowercased_and_values_trimmed() {
        let data = b"MESSAGE\nMessage-Id:  m1 \nDestination: /queue/a\n\nhi\x00\n";
        let (_, frame) = parse_frame(data, true).unwrap();
        match frame.to_server_frame() {
            ServerFrame::Message {
                message_id,
                headers,
                body,
            } => {
                assert_eq!(message_id.as_deref(), Some("m1"));
                assert_eq!(
                    headers,
                    vec![
                        ("message-id".to_string(), "m1".to_string()),
                        ("destination".to_string(), "/queue/a".to_string()),
                    ]
                );
                assert_eq!(body, b"hi");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn duplicate_headers_are_preserved() {
        let data = b"MESSAGE\nmessage-id:m1\nfoo:1\nfoo:2\n\nhi\x00\n";
        let (_, frame) = parse_frame(data, true).unwrap();
        let dupes: Vec<_> = frame
            .headers
            .iter()
            .filter(|(name, _)| *name == b"foo")
            .collect();
        assert_eq!(dupes.len(), 2);
    }

    #[test]
    fn round_trip_headers() {
        let headers = vec![
            ("destination".to_string(), "/queue/a".to_string()),
            ("custom".to_string(), "some value".to_string()),
            ("empty".to_string(), "".to_string()),
        ];
        let frame = ClientFrame {
            command: "SEND",
            headers: headers.clone(),
            body: Some(b"payload".to_vec()),
        };
        let bytes = serialized(&frame);
        let (rest, parsed) = parse_frame(&bytes, true).unwrap();
        assert!(rest.is_empty());
        let parsed_headers: Vec<(String, String)> = parsed
            .headers
            .iter()
            .map(|(k, v)| {
                (
                    String::from_utf8_lossy(k).to_lowercase(),
                    String::from_utf8_lossy(v).trim().to_string(),
                )
            })
            .collect();
        assert_eq!(parsed_headers, headers);
        assert_eq!(parsed.body, Some(&b"payload"[..]));
    }
}
