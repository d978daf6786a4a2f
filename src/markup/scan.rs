//! Offset-based scanning helpers over an immutable markup slice.
//!
//! Every helper is pure: it takes a slice (plus an offset where needed) and
//! returns offsets relative to that slice. Delimiters are ASCII, so every
//! returned offset lies on a `char` boundary.

/// Declaration prologue marker
const PROLOGUE_OPEN: &str = "<?xml";
const PROLOGUE_CLOSE: &str = "?>";

/// An opening (or self-closing) tag matched at the start of a slice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenTag<'a> {
    pub name: &'a str,
    /// Raw span between the name and the terminator
    pub attrs: &'a str,
    /// Byte length of the whole tag including `<` and `>`
    pub len: usize,
    pub self_closing: bool,
}

/// A closing tag located by [`find_matching_close`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CloseTag {
    /// Offset of the `<` of the closing tag
    pub start: usize,
    /// Offset just past its `>`
    pub end: usize,
}

/// Bytes that may appear in a tag name
pub(crate) fn is_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'<' | b'>' | b'/')
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Removes a leading `<?xml ... ?>` declaration.
///
/// Returns the slice unchanged when there is no declaration and `None` when
/// the declaration is never terminated.
pub fn strip_prologue(s: &str) -> Option<&str> {
    if !s.starts_with(PROLOGUE_OPEN) {
        return Some(s);
    }
    let close = s.find(PROLOGUE_CLOSE)?;
    s.get(close + PROLOGUE_CLOSE.len()..)
}

/// Finds the `>` ending the tag whose attribute span starts at `from`.
///
/// Quoted attribute values are skipped, so a `>` inside quotes does not end
/// the tag. A `<` cannot occur inside a tag, so the search gives up at the
/// next one, quoted or not.
pub fn find_tag_end(s: &str, from: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut quote: Option<u8> = None;
    for (idx, &b) in bytes.iter().enumerate().skip(from) {
        match (quote, b) {
            (_, b'<') => return None,
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return Some(idx),
            (None, _) => {}
        }
    }
    None
}

/// Matches an opening or self-closing tag at the very start of `s`
pub fn match_open_tag(s: &str) -> Option<OpenTag<'_>> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'<') {
        return None;
    }
    let name_len = bytes
        .iter()
        .skip(1)
        .take_while(|&&b| is_name_byte(b))
        .count();
    if name_len == 0 {
        return None;
    }
    let name_end = 1 + name_len;
    let gt = find_tag_end(s, name_end)?;
    let self_closing = gt > name_end && bytes.get(gt - 1) == Some(&b'/');
    let attrs_end = if self_closing { gt - 1 } else { gt };

    Some(OpenTag {
        name: s.get(1..name_end)?,
        attrs: s.get(name_end..attrs_end)?,
        len: gt + 1,
        self_closing,
    })
}

/// Matches a self-closing tag at the very start of `s`
pub fn match_self_closing(s: &str) -> Option<OpenTag<'_>> {
    match_open_tag(s).filter(|tag| tag.self_closing)
}

/// Returns the end offset of `</name>` if one starts at `at`
fn match_close_tag(s: &str, at: usize, name: &str) -> Option<usize> {
    let rest = s.get(at..)?.strip_prefix("</")?.strip_prefix(name)?;
    let after = rest.trim_start().strip_prefix('>')?;
    Some(s.len() - after.len())
}

/// True when an opening tag of exactly `name` starts at `at`
fn opens_name(s: &str, at: usize, name: &str) -> bool {
    s.get(at..)
        .and_then(|rest| rest.strip_prefix('<'))
        .and_then(|rest| rest.strip_prefix(name))
        .and_then(|rest| rest.as_bytes().first().copied())
        .is_some_and(|b| !is_name_byte(b))
}

/// Locates the closing tag balancing an already-consumed `<name ...>`.
///
/// `s` is the content following the opening tag. Nested opening tags of the
/// same name raise the depth and closing tags lower it; the match is the
/// closing tag that brings the depth back to zero.
pub fn find_matching_close(s: &str, name: &str) -> Option<CloseTag> {
    let mut depth: usize = 1;
    let mut pos = 0;

    while let Some(rel) = s.get(pos..).and_then(|rest| rest.find('<')) {
        let at = pos + rel;
        if let Some(end) = match_close_tag(s, at, name) {
            depth -= 1;
            if depth == 0 {
                return Some(CloseTag { start: at, end });
            }
            pos = end;
            continue;
        }
        if opens_name(s, at, name) {
            if let Some(tag) = s.get(at..).and_then(match_open_tag) {
                if !tag.self_closing {
                    depth += 1;
                }
                pos = at + tag.len;
                continue;
            }
        }
        pos = at + 1;
    }
    None
}

/// Iterator over `name="value"` pairs of an attribute span
#[derive(Clone, Debug)]
pub struct Attributes<'a> {
    span: &'a str,
    pos: usize,
}

/// Extracts `identifier="literal"` pairs from a tag's attribute span.
///
/// Values are returned verbatim; escaped sequences are not decoded.
pub fn attributes(span: &str) -> Attributes<'_> {
    Attributes { span, pos: 0 }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.span.as_bytes();
        while let Some(&b) = bytes.get(self.pos) {
            if !is_word_byte(b) {
                self.pos += 1;
                continue;
            }
            let start = self.pos;
            let word_len = bytes
                .iter()
                .skip(start)
                .take_while(|&&b| is_word_byte(b))
                .count();
            let name_end = start + word_len;
            self.pos = name_end;

            let Some(value_src) = self
                .span
                .get(name_end..)
                .and_then(|rest| rest.strip_prefix("=\""))
            else {
                continue;
            };
            let Some(value_len) = value_src.find('"') else {
                // no closing quote anywhere: nothing further can match
                self.pos = bytes.len();
                return None;
            };
            let value_start = name_end + 2;
            self.pos = value_start + value_len + 1;
            let name = self.span.get(start..name_end)?;
            let value = self.span.get(value_start..value_start + value_len)?;
            return Some((name, value));
        }
        None
    }
}
