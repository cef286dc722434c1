//! Just enough JSON scanning to find and edit object members in place.
//!
//! Nothing is decoded or re-encoded: lookups return byte spans into the original document and
//! [`set`] splices new text into it, so member order, whitespace and number formatting of
//! everything else stay exactly as they were.

use std::ops::Range;

use crate::error::SetFieldError;

/// Returns the byte span of the value at `path`, walking nested objects from the root.
pub(crate) fn get(document: &[u8], path: &[&str]) -> Option<Range<usize>> {
    let mut object_start = root_object(document).ok()?;
    let mut found = None;

    for key in path {
        let span = Scanner::at(document, object_start).scan_object(key).ok()?.found?;
        object_start = span.start;
        found = Some(span);
    }

    found
}

/// Sets the member at `path` to `value`, which must already be serialized JSON text.
///
/// An existing member is overwritten in place. A missing member is appended at the end of its
/// parent object, and missing parent objects are created on the way.
pub(crate) fn set(document: &[u8], path: &[&str], value: &str) -> Result<Vec<u8>, SetFieldError> {
    let (last, parents) = path.split_last().ok_or(SetFieldError::EmptyPath)?;
    let mut object_start = root_object(document)?;

    for (depth, key) in parents.iter().enumerate() {
        let scan = Scanner::at(document, object_start).scan_object(key)?;

        match scan.found {
            Some(span) if document[span.start] == b'{' => object_start = span.start,
            Some(_) => {
                return Err(SetFieldError::NotAnObject {
                    path: parents[..=depth].join("."),
                });
            }
            None => {
                let nested = nest(&path[depth + 1..], value);
                return Ok(append_member(document, &scan, key, &nested));
            }
        }
    }

    let scan = Scanner::at(document, object_start).scan_object(last)?;

    Ok(match scan.found {
        Some(span) => splice(document, span, value.as_bytes()),
        None => append_member(document, &scan, last, value),
    })
}

fn root_object(document: &[u8]) -> Result<usize, SetFieldError> {
    let mut scanner = Scanner::at(document, 0);
    scanner.skip_whitespace();

    match scanner.peek() {
        Some(b'{') => Ok(scanner.pos),
        Some(_) => Err(SetFieldError::RootNotObject),
        None => Err(SetFieldError::Malformed { offset: scanner.pos }),
    }
}

/// Wraps `value` in one object per key: `["a", "b"]` gives `{"a":{"b":value}}`.
fn nest(keys: &[&str], value: &str) -> String {
    keys.iter()
        .rev()
        .fold(value.to_string(), |inner, key| format!("{{{}:{inner}}}", quote(key)))
}

fn append_member(document: &[u8], scan: &ObjectScan, key: &str, value: &str) -> Vec<u8> {
    let separator = if scan.empty { "" } else { "," };
    let member = format!("{separator}{}:{value}", quote(key));

    splice(document, scan.close..scan.close, member.as_bytes())
}

fn splice(document: &[u8], span: Range<usize>, replacement: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(document.len() - span.len() + replacement.len());

    output.extend_from_slice(&document[..span.start]);
    output.extend_from_slice(replacement);
    output.extend_from_slice(&document[span.end..]);

    output
}

fn quote(key: &str) -> String {
    serde_json::Value::from(key).to_string()
}

/// Result of scanning one object for a key.
#[derive(Debug)]
struct ObjectScan {
    /// Span of the first member value under the key.
    found: Option<Range<usize>>,
    /// Offset of the closing brace.
    close: usize,
    /// Whether the object has no members.
    empty: bool,
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn malformed(&self) -> SetFieldError {
        SetFieldError::Malformed { offset: self.pos }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), SetFieldError> {
        if self.peek() != Some(byte) {
            return Err(self.malformed());
        }

        self.pos += 1;
        Ok(())
    }

    fn scan_object(mut self, key: &str) -> Result<ObjectScan, SetFieldError> {
        self.expect(b'{')?;
        self.skip_whitespace();

        if self.peek() == Some(b'}') {
            return Ok(ObjectScan {
                found: None,
                close: self.pos,
                empty: true,
            });
        }

        let mut found = None;

        loop {
            self.skip_whitespace();

            let key_start = self.pos;
            self.skip_string()?;
            let raw_key = &self.bytes[key_start + 1..self.pos - 1];

            self.skip_whitespace();
            self.expect(b':')?;
            self.skip_whitespace();

            let value_start = self.pos;
            self.skip_value()?;

            if found.is_none() && raw_key == key.as_bytes() {
                found = Some(value_start..self.pos);
            }

            self.skip_whitespace();

            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    return Ok(ObjectScan {
                        found,
                        close: self.pos,
                        empty: false,
                    });
                }
                _ => return Err(self.malformed()),
            }
        }
    }

    fn skip_value(&mut self) -> Result<(), SetFieldError> {
        match self.peek() {
            Some(b'"') => self.skip_string(),
            Some(b'{' | b'[') => self.skip_container(),
            Some(_) => self.skip_scalar(),
            None => Err(self.malformed()),
        }
    }

    fn skip_string(&mut self) -> Result<(), SetFieldError> {
        self.expect(b'"')?;

        loop {
            match self.peek() {
                Some(b'\\') => self.pos += 2,
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
                None => return Err(self.malformed()),
            }
        }
    }

    fn skip_container(&mut self) -> Result<(), SetFieldError> {
        let mut depth = 0usize;

        loop {
            match self.peek() {
                Some(b'"') => {
                    self.skip_string()?;
                    continue;
                }
                Some(b'{' | b'[') => depth += 1,
                Some(b'}' | b']') => {
                    depth -= 1;

                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => return Err(self.malformed()),
            }

            self.pos += 1;
        }
    }

    /// Numbers, `true`, `false` and `null`.
    fn skip_scalar(&mut self) -> Result<(), SetFieldError> {
        let start = self.pos;

        while let Some(byte) = self.peek() {
            if matches!(byte, b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r' | b'"' | b'{' | b'[' | b':') {
                break;
            }

            self.pos += 1;
        }

        if self.pos == start {
            return Err(self.malformed());
        }

        Ok(())
    }
}
