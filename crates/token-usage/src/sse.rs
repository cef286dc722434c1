//! Event-stream framing: normalization, record splitting and joining.

use std::borrow::Cow;

/// Separator between two event-stream records after normalization.
pub const RECORD_DELIMITER: &[u8] = b"\n\n";

/// Field marker carrying the JSON payload of a record.
pub const DATA_PREFIX: &[u8] = b"data: ";

/// Rewrites upstream framing into the canonical `\n\n`-delimited form.
pub trait SseNormalizer: Send + Sync {
    /// Returns `data` in canonical form, borrowing when nothing had to change.
    fn normalize<'a>(&self, data: &'a [u8]) -> Cow<'a, [u8]>;
}

/// Turns `\r\n` and lone `\r` line endings into `\n`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineEndingNormalizer;

impl SseNormalizer for LineEndingNormalizer {
    fn normalize<'a>(&self, data: &'a [u8]) -> Cow<'a, [u8]> {
        if !data.contains(&b'\r') {
            return Cow::Borrowed(data);
        }

        let mut normalized = Vec::with_capacity(data.len());
        let mut bytes = data.iter().copied().peekable();

        while let Some(byte) = bytes.next() {
            if byte == b'\r' {
                bytes.next_if_eq(&b'\n');
                normalized.push(b'\n');
            } else {
                normalized.push(byte);
            }
        }

        Cow::Owned(normalized)
    }
}

/// Splits normalized data on [`RECORD_DELIMITER`].
///
/// Every delimiter produces a boundary, so a terminal delimiter yields a trailing empty record
/// and [`join_records`] reproduces the input exactly.
pub fn split_records(data: &[u8]) -> Records<'_> {
    Records { rest: Some(data) }
}

/// Iterator returned by [`split_records`].
#[derive(Debug, Clone)]
pub struct Records<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;

        match find(rest, RECORD_DELIMITER) {
            Some(pos) => {
                self.rest = Some(&rest[pos + RECORD_DELIMITER.len()..]);
                Some(&rest[..pos])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

/// Concatenates records with [`RECORD_DELIMITER`] between them.
pub fn join_records<I, R>(records: I) -> Vec<u8>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[u8]>,
{
    let mut joined = Vec::new();

    for (i, record) in records.into_iter().enumerate() {
        if i > 0 {
            joined.extend_from_slice(RECORD_DELIMITER);
        }

        joined.extend_from_slice(record.as_ref());
    }

    joined
}

/// One event-stream record, split into its framing and its payload.
///
/// Field lines that precede the `data: ` line (such as `event: message_delta`) are kept as the
/// preamble so a rewritten record can be framed the same way it arrived. A record without a
/// `data: ` line, such as a plain JSON body, stays unframed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRecord<'a> {
    raw: &'a [u8],
    preamble: &'a [u8],
    payload: &'a [u8],
    framed: bool,
}

impl<'a> StreamRecord<'a> {
    /// Locates the first `data: ` line of `raw`. Without one, the whole record is the payload.
    pub fn parse(raw: &'a [u8]) -> Self {
        let mut line_start = 0;

        loop {
            if raw[line_start..].starts_with(DATA_PREFIX) {
                return Self {
                    raw,
                    preamble: &raw[..line_start],
                    payload: &raw[line_start + DATA_PREFIX.len()..],
                    framed: true,
                };
            }

            match raw[line_start..].iter().position(|&b| b == b'\n') {
                Some(newline) => line_start += newline + 1,
                None => break,
            }
        }

        Self {
            raw,
            preamble: &[],
            payload: raw,
            framed: false,
        }
    }

    /// The record exactly as it was split.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// Field lines before the `data: ` marker, including their trailing newline.
    pub fn preamble(&self) -> &'a [u8] {
        self.preamble
    }

    /// Everything after the `data: ` marker.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Whether the record carried a `data: ` marker.
    pub fn is_framed(&self) -> bool {
        self.framed
    }

    /// Frames a replacement payload the way this record was framed.
    pub fn reframe(&self, payload: &[u8]) -> Vec<u8> {
        if !self.framed {
            return payload.to_vec();
        }

        let mut framed = Vec::with_capacity(self.preamble.len() + DATA_PREFIX.len() + payload.len());

        framed.extend_from_slice(self.preamble);
        framed.extend_from_slice(DATA_PREFIX);
        framed.extend_from_slice(payload);

        framed
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
