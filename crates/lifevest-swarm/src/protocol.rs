//! Secret transmission protocol
//!
//! The extraction helper prints every mounted secret between markers:
//!
//! ```text
//! -----BEGIN-----
//! /<secret id>.secret
//! <base64 lines>
//!
//! -----NEXT-----
//! -----END-----
//! ```
//!
//! The daemon wraps each output line in an 8-byte multiplexed stream header.
//! [`parse_transmission`] strips those headers and runs a small state machine
//! over the whole log. It is pure and re-run on every poll, so a partially
//! written log simply yields an incomplete [`Transmission`].

use std::collections::BTreeMap;

pub const BEGIN_MARKER: &str = "-----BEGIN-----";
pub const NEXT_MARKER: &str = "-----NEXT-----";
pub const END_MARKER: &str = "-----END-----";

/// Size of the multiplexed stream header preceding each log line
pub const LINE_PREFIX_LEN: usize = 8;

/// Text the daemon puts in a log response when a Swarm log stream breaks
pub const LOG_CORRUPTION_SIGNATURE: &str = "incomplete log stream";

/// Extension of the files the helper mounts secrets as
pub const SECRET_FILE_SUFFIX: &str = ".secret";

/// Shell script run by the helper through `sh -c`
pub fn helper_script() -> String {
    [
        format!("echo {}", BEGIN_MARKER),
        format!("if ls /*{} >/dev/null 2>&1", SECRET_FILE_SUFFIX),
        format!("then for i in /*{}", SECRET_FILE_SUFFIX),
        "do echo $i".to_string(),
        "base64 $i".to_string(),
        "echo".to_string(),
        format!("echo {}", NEXT_MARKER),
        "done".to_string(),
        "fi".to_string(),
        format!("echo {}", END_MARKER),
    ]
    .join("; ")
}

/// Path a secret is mounted at inside the helper
pub fn secret_mount_path(id: &str) -> String {
    format!("/{}{}", id, SECRET_FILE_SUFFIX)
}

/// Secret identifier announced by a `/<id>.secret` line
pub fn secret_id_from_path(line: &str) -> Option<&str> {
    let file = line.trim().trim_start_matches('/');
    let id = file.split('.').next().unwrap_or_default();
    (!id.is_empty()).then_some(id)
}

/// True when the daemon reported a broken log stream
pub fn is_corrupted(raw: &[u8]) -> bool {
    String::from_utf8_lossy(raw).contains(LOG_CORRUPTION_SIGNATURE)
}

/// Split a raw log into text lines, removing the stream header of each
pub fn log_lines(raw: &[u8]) -> Vec<String> {
    if let Some(payload) = demultiplex(raw) {
        return payload
            .split(|b| *b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect();
    }

    raw.split(|b| *b == b'\n')
        .map(|line| String::from_utf8_lossy(line.get(LINE_PREFIX_LEN..).unwrap_or_default()).into_owned())
        .collect()
}

/// Concatenate frame payloads when `raw` is a well-formed multiplexed stream
fn demultiplex(raw: &[u8]) -> Option<Vec<u8>> {
    if raw.is_empty() {
        return None;
    }

    let mut payload = Vec::with_capacity(raw.len());
    let mut rest = raw;
    while !rest.is_empty() {
        let header = rest.get(..LINE_PREFIX_LEN)?;
        if header[0] > 2 || header[1..4] != [0, 0, 0] {
            return None;
        }
        let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let frame = rest.get(LINE_PREFIX_LEN..LINE_PREFIX_LEN + size)?;
        payload.extend_from_slice(frame);
        rest = &rest[LINE_PREFIX_LEN + size..];
    }
    Some(payload)
}

/// Where the parser stands in the helper output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    AwaitBegin,
    ReadingSecretName,
    ReadingPayload,
    AwaitNextOrEnd,
    Finished,
}

/// What has been received from the helper so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transmission {
    /// Secret identifier -> base64 body, as printed by the helper
    pub secrets: BTreeMap<String, String>,
    /// The begin marker was seen
    pub begun: bool,
    /// The end marker was seen after the begin marker
    pub complete: bool,
}

struct Parser {
    state: ParserState,
    current: Option<(String, String)>,
    transmission: Transmission,
}

impl Parser {
    fn new() -> Self {
        Self {
            state: ParserState::AwaitBegin,
            current: None,
            transmission: Transmission::default(),
        }
    }

    fn feed(&mut self, line: &str) {
        let line = line.trim();
        self.state = match self.state {
            ParserState::AwaitBegin if line == BEGIN_MARKER => {
                self.transmission.begun = true;
                ParserState::ReadingSecretName
            }
            ParserState::AwaitBegin => ParserState::AwaitBegin,
            ParserState::ReadingSecretName => match line {
                END_MARKER => self.finish(),
                "" | BEGIN_MARKER | NEXT_MARKER => ParserState::ReadingSecretName,
                _ => match secret_id_from_path(line) {
                    Some(id) => {
                        self.current = Some((id.to_string(), String::new()));
                        ParserState::ReadingPayload
                    }
                    None => ParserState::ReadingSecretName,
                },
            },
            ParserState::ReadingPayload | ParserState::AwaitNextOrEnd => match line {
                NEXT_MARKER => {
                    self.emit();
                    ParserState::ReadingSecretName
                }
                END_MARKER => {
                    self.emit();
                    self.finish()
                }
                "" => ParserState::AwaitNextOrEnd,
                _ => {
                    if let Some((_, body)) = self.current.as_mut() {
                        body.push_str(line);
                    }
                    ParserState::ReadingPayload
                }
            },
            ParserState::Finished => ParserState::Finished,
        };
    }

    fn emit(&mut self) {
        if let Some((id, body)) = self.current.take() {
            self.transmission.secrets.insert(id, body);
        }
    }

    fn finish(&mut self) -> ParserState {
        self.transmission.complete = true;
        ParserState::Finished
    }
}

/// Parse the complete helper log received so far
pub fn parse_transmission(raw: &[u8]) -> Transmission {
    let mut parser = Parser::new();
    for line in log_lines(raw) {
        parser.feed(&line);
    }
    parser.transmission
}

/// Encode lines the way the daemon frames stdout
///
/// Used by [`MockSwarm`](crate::mock::MockSwarm) to produce realistic logs.
pub fn frame_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<u8> {
    let mut out = Vec::new();
    for line in lines {
        let size = (line.len() + 1) as u32;
        out.extend_from_slice(&[1, 0, 0, 0]);
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_script() {
        insta::assert_snapshot!(
            helper_script(),
            @"echo -----BEGIN-----; if ls /*.secret >/dev/null 2>&1; then for i in /*.secret; do echo $i; base64 $i; echo; echo -----NEXT-----; done; fi; echo -----END-----"
        );
    }

    #[test]
    fn test_secret_id_from_path() {
        assert_eq!(secret_id_from_path("/abc123.secret"), Some("abc123"));
        assert_eq!(secret_id_from_path("  /abc123.secret \r"), Some("abc123"));
        assert_eq!(secret_id_from_path("/"), None);
        assert_eq!(secret_mount_path("abc123"), "/abc123.secret");
    }

    #[test]
    fn test_parse_two_secrets() {
        let raw = frame_lines([
            BEGIN_MARKER,
            "/s1.secret",
            "aGVsbG8Kd29y",
            "bGQ=",
            "",
            NEXT_MARKER,
            "/s2.secret",
            "eA==",
            "",
            NEXT_MARKER,
            END_MARKER,
        ]);

        let transmission = parse_transmission(&raw);
        assert!(transmission.begun);
        assert!(transmission.complete);
        assert_eq!(transmission.secrets["s1"], "aGVsbG8Kd29ybGQ=");
        assert_eq!(transmission.secrets["s2"], "eA==");
    }

    #[test]
    fn test_partial_log_is_incomplete() {
        let raw = frame_lines([BEGIN_MARKER, "/s1.secret", "eA=="]);
        let transmission = parse_transmission(&raw);
        assert!(transmission.begun);
        assert!(!transmission.complete);
        assert!(transmission.secrets.is_empty());
    }

    #[test]
    fn test_no_secrets_only_markers() {
        let transmission = parse_transmission(&frame_lines([BEGIN_MARKER, END_MARKER]));
        assert!(transmission.complete);
        assert!(transmission.secrets.is_empty());
    }

    #[test]
    fn test_end_before_begin_is_ignored() {
        let transmission = parse_transmission(&frame_lines([END_MARKER, "/x.secret"]));
        assert!(!transmission.begun);
        assert!(!transmission.complete);
    }

    #[test]
    fn test_frame_header_containing_newline_byte() {
        // A 10-byte frame has 0x0A as its last header byte
        let mut raw = frame_lines([BEGIN_MARKER]);
        raw.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 10]);
        raw.extend_from_slice(b"/abc.secr\n");
        raw.extend(frame_lines(["eA==", "", NEXT_MARKER, END_MARKER]));

        let transmission = parse_transmission(&raw);
        assert!(transmission.complete);
        assert_eq!(transmission.secrets["abc"], "eA==");
    }

    #[test]
    fn test_unframed_fallback_strips_prefix() {
        let raw = b"XXXXXXXX-----BEGIN-----\nXXXXXXXX/id.secret\nXXXXXXXXeA==\nXXXXXXXX\nXXXXXXXX-----END-----\n";
        let transmission = parse_transmission(raw);
        assert!(transmission.complete);
        assert_eq!(transmission.secrets["id"], "eA==");
    }

    #[test]
    fn test_corruption_signature() {
        assert!(is_corrupted(b"Error grabbing logs: incomplete log stream"));
        assert!(!is_corrupted(&frame_lines([BEGIN_MARKER])));
    }
}
