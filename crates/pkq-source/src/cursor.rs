//! # Stanza Cursor — deb822 Paragraph Walker
//!
//! Walks a byte buffer of deb822 control data (the dpkg status file, apt
//! `Packages` indexes) one paragraph at a time. Paragraphs and field values
//! are borrowed slices of the buffer; nothing is copied until a caller asks
//! for a field's text.
//!
//! ```text
//! Package: vim            <- field line
//! Description: Vi IMproved
//!  Vim is an almost ...   <- continuation (leading space)
//!  .                      <- paragraph break inside a value
//!                         <- blank line ends the stanza
//! ```

/// Position tracker over a buffer of stanzas.
///
/// `pos` only moves forward. Once it reaches the end of the buffer the cursor
/// is exhausted and stays that way.
pub struct StanzaCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StanzaCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Byte offset of the next unread line.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Advance past the next stanza and return it, or `None` at end of data.
    pub fn next_stanza(&mut self) -> Option<Stanza<'a>> {
        // Skip separator lines.
        while !self.is_exhausted() {
            let (line, next) = split_line(self.data, self.pos);
            if !is_blank(line) {
                break;
            }
            self.pos = next;
        }
        if self.is_exhausted() {
            return None;
        }

        let start = self.pos;
        let mut end = start;
        while !self.is_exhausted() {
            let (line, next) = split_line(self.data, self.pos);
            if is_blank(line) {
                break;
            }
            end = self.pos + line.len();
            self.pos = next;
        }

        Some(Stanza {
            raw: &self.data[start..end],
        })
    }
}

impl<'a> Iterator for StanzaCursor<'a> {
    type Item = Stanza<'a>;

    fn next(&mut self) -> Option<Stanza<'a>> {
        self.next_stanza()
    }
}

/// One deb822 paragraph.
#[derive(Debug, Clone, Copy)]
pub struct Stanza<'a> {
    raw: &'a [u8],
}

impl<'a> Stanza<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    pub fn fields(&self) -> Fields<'a> {
        Fields {
            raw: self.raw,
            pos: 0,
        }
    }

    /// Text of the first field named `name` (case-insensitive).
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.text())
    }
}

/// Iterator over the fields of a [`Stanza`].
///
/// Lines without a colon and orphaned continuation lines are skipped.
pub struct Fields<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Fields<'a> {
    type Item = Field<'a>;

    fn next(&mut self) -> Option<Field<'a>> {
        while self.pos < self.raw.len() {
            let line_start = self.pos;
            let (line, next) = split_line(self.raw, self.pos);
            self.pos = next;

            if is_continuation(line) {
                continue;
            }
            let Some(colon) = line.iter().position(|&b| b == b':') else {
                continue;
            };
            let Ok(name) = std::str::from_utf8(&line[..colon]) else {
                continue;
            };

            let value_start = line_start + colon + 1;
            let mut value_end = line_start + line.len();
            while self.pos < self.raw.len() {
                let (cont, after) = split_line(self.raw, self.pos);
                if !is_continuation(cont) {
                    break;
                }
                value_end = self.pos + cont.len();
                self.pos = after;
            }

            return Some(Field {
                name: name.trim(),
                value: &self.raw[value_start..value_end],
            });
        }
        None
    }
}

/// A field name and its raw value bytes, continuation lines included.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    pub name: &'a str,
    value: &'a [u8],
}

impl<'a> Field<'a> {
    /// The value on the field line itself, trimmed.
    pub fn first_line(&self) -> String {
        let (line, _) = split_line(self.value, 0);
        String::from_utf8_lossy(line).trim().to_string()
    }

    /// Full value with continuation lines unfolded.
    ///
    /// The leading space of each continuation line is dropped and a lone `.`
    /// becomes an empty line.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.value.len());
        for (i, line) in self.value.split(|&b| b == b'\n').enumerate() {
            let line = String::from_utf8_lossy(line);
            let line = line.trim_end_matches('\r');
            if i == 0 {
                out.push_str(line.trim());
                continue;
            }
            out.push('\n');
            let body = line.get(1..).unwrap_or("");
            if body.trim() != "." {
                out.push_str(body.trim_end());
            }
        }
        out
    }
}

/// Returns the line starting at `pos` (without its `\n`) and the offset of
/// the line after it.
fn split_line(data: &[u8], pos: usize) -> (&[u8], usize) {
    match data[pos..].iter().position(|&b| b == b'\n') {
        Some(i) => (&data[pos..pos + i], pos + i + 1),
        None => (&data[pos..], data.len()),
    }
}

#[inline]
fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

#[inline]
fn is_continuation(line: &[u8]) -> bool {
    matches!(line.first(), Some(b' ') | Some(b'\t'))
}

// =============================================================================
// Kani Proofs: Cursor Progress
// =============================================================================

#[cfg(kani)]
mod proofs {
    use super::*;

    /// **Proof: the cursor always terminates inside the buffer**
    ///
    /// Over any 6-byte buffer, every stanza strictly advances the cursor,
    /// stanzas are never empty, and the position never passes the end.
    #[kani::proof]
    #[kani::unwind(8)]
    fn verify_cursor_advances_within_bounds() {
        let data: [u8; 6] = kani::any();
        let mut cursor = StanzaCursor::new(&data);

        let mut last = cursor.position();
        let mut stanzas = 0;
        while let Some(stanza) = cursor.next_stanza() {
            assert!(!stanza.as_bytes().is_empty());
            assert!(cursor.position() > last);
            assert!(cursor.position() <= data.len());
            last = cursor.position();
            stanzas += 1;
        }
        assert!(stanzas <= data.len());
        assert!(cursor.is_exhausted());
    }
}
