//! Tag-level scanner for MJCF-style scene text.
//!
//! Splits text into tag regions (open, close, self-closing, comment,
//! declaration) without building a document tree, so untouched bytes can be
//! copied through verbatim. [`element_end`] walks nested elements by
//! recursive descent to find the full extent of a sub-tree.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Kind of a scanned tag region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `<name ...>`
    Open,
    /// `</name>`
    Close,
    /// `<name .../>`
    SelfClosing,
    /// `<!-- ... -->`
    Comment,
    /// `<? ... ?>`, `<!DOCTYPE ...>`, `<![CDATA[ ... ]]>`
    Declaration,
}

/// One tag region: `text[start..end]` is the full tag including brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    pub kind: TagKind,
    /// Element name; empty for comments and declarations.
    pub name: &'a str,
    pub start: usize,
    pub end: usize,
}

impl Tag<'_> {
    /// Whether this tag opens an element (including self-closing ones).
    pub fn is_element(&self) -> bool {
        matches!(self.kind, TagKind::Open | TagKind::SelfClosing)
    }

    /// The tag's text within `source`.
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start..self.end]
    }
}

/// A quoted attribute inside a tag. Offsets are relative to the tag text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr<'a> {
    pub name: &'a str,
    pub value: &'a str,
    /// Start of the attribute name.
    pub start: usize,
    /// Byte just past the closing quote.
    pub end: usize,
    pub value_start: usize,
    pub value_end: usize,
}

/// Structural errors found while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("unterminated {what} at byte {offset}")]
    Unterminated { what: &'static str, offset: usize },

    #[error("unexpected </{found}> at byte {offset}, expected </{expected}>")]
    Mismatched {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("<{name}> at byte {offset} is never closed")]
    Unclosed { name: String, offset: usize },
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Split `text` into tag regions in document order.
pub fn tokenize(text: &str) -> Result<Vec<Tag<'_>>, ScanError> {
    let mut tags = Vec::new();
    let mut pos = 0;
    while let Some(rel) = text[pos..].find('<') {
        let start = pos + rel;
        let rest = &text[start..];
        let (kind, end) = if rest.starts_with("<!--") {
            (TagKind::Comment, start + terminated(rest, "-->", "comment", start)?)
        } else if rest.starts_with("<?") {
            (
                TagKind::Declaration,
                start + terminated(rest, "?>", "declaration", start)?,
            )
        } else if rest.starts_with("<![CDATA[") {
            (
                TagKind::Declaration,
                start + terminated(rest, "]]>", "CDATA section", start)?,
            )
        } else if rest.starts_with("<!") {
            (
                TagKind::Declaration,
                start + terminated(rest, ">", "declaration", start)?,
            )
        } else {
            let close = find_tag_end(text.as_bytes(), start).ok_or(ScanError::Unterminated {
                what: "tag",
                offset: start,
            })?;
            let kind = if rest.starts_with("</") {
                TagKind::Close
            } else if text.as_bytes()[close - 1] == b'/' {
                TagKind::SelfClosing
            } else {
                TagKind::Open
            };
            (kind, close + 1)
        };
        let name = match kind {
            TagKind::Open | TagKind::Close | TagKind::SelfClosing => tag_name(&text[start..end]),
            TagKind::Comment | TagKind::Declaration => "",
        };
        tags.push(Tag {
            kind,
            name,
            start,
            end,
        });
        pos = end;
    }
    Ok(tags)
}

/// Length of `rest` up to and including `terminator`.
fn terminated(
    rest: &str,
    terminator: &str,
    what: &'static str,
    offset: usize,
) -> Result<usize, ScanError> {
    rest.find(terminator)
        .map(|i| i + terminator.len())
        .ok_or(ScanError::Unterminated { what, offset })
}

/// Index of the `>` closing the tag opened at `start`, skipping quoted values.
fn find_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(start + 1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

fn tag_name(tag: &str) -> &str {
    let inner = tag.trim_start_matches('<').trim_start_matches('/');
    let end = inner
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(inner.len());
    &inner[..end]
}

// ---------------------------------------------------------------------------
// Element extent
// ---------------------------------------------------------------------------

/// Index one past the tag that closes the element opened at `tags[open]`.
///
/// Nested elements are skipped recursively, so an element containing
/// same-named children resolves to its own closing tag.
pub fn element_end(tags: &[Tag<'_>], open: usize) -> Result<usize, ScanError> {
    let tag = tags[open];
    if tag.kind != TagKind::Open {
        return Ok(open + 1);
    }
    let mut i = open + 1;
    while let Some(t) = tags.get(i) {
        match t.kind {
            TagKind::Open => i = element_end(tags, i)?,
            TagKind::Close if t.name == tag.name => return Ok(i + 1),
            TagKind::Close => {
                return Err(ScanError::Mismatched {
                    expected: tag.name.to_owned(),
                    found: t.name.to_owned(),
                    offset: t.start,
                });
            }
            TagKind::SelfClosing | TagKind::Comment | TagKind::Declaration => i += 1,
        }
    }
    Err(ScanError::Unclosed {
        name: tag.name.to_owned(),
        offset: tag.start,
    })
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Parse the quoted attributes of a single tag.
pub fn attributes(tag: &str) -> Vec<Attr<'_>> {
    let bytes = tag.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 1;
    if bytes.get(i) == Some(&b'/') {
        i += 1;
    }
    while i < bytes.len() && !is_delim(bytes[i]) {
        i += 1;
    }
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'>' || bytes[i] == b'/' {
            break;
        }
        let start = i;
        while i < bytes.len() && !is_delim(bytes[i]) && bytes[i] != b'=' {
            i += 1;
        }
        let name = &tag[start..i];
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            if name.is_empty() {
                i += 1;
            }
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let Some(&quote) = bytes.get(i).filter(|&&b| b == b'"' || b == b'\'') else {
            break;
        };
        let value_start = i + 1;
        let Some(len) = tag[value_start..].find(char::from(quote)) else {
            break;
        };
        let value_end = value_start + len;
        attrs.push(Attr {
            name,
            value: &tag[value_start..value_end],
            start,
            end: value_end + 1,
            value_start,
            value_end,
        });
        i = value_end + 1;
    }
    attrs
}

const fn is_delim(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'>' || b == b'/'
}

/// Look up one attribute of a tag by name.
pub fn attr<'a>(tag: &'a str, name: &str) -> Option<Attr<'a>> {
    attributes(tag).into_iter().find(|a| a.name == name)
}

/// Return `tag` with attribute `name` set to `value`, appending it when absent.
pub fn set_attr(tag: &str, name: &str, value: &str) -> String {
    if let Some(a) = attr(tag, name) {
        return format!("{}{value}{}", &tag[..a.value_start], &tag[a.value_end..]);
    }
    let insert_at = if tag.ends_with("/>") {
        tag.len() - 2
    } else {
        tag.len() - 1
    };
    let head = tag[..insert_at].trim_end();
    let tail = &tag[insert_at..];
    format!("{head} {name}=\"{value}\"{tail}")
}

/// Return `tag` without attribute `name` (and the whitespace before it).
pub fn remove_attr(tag: &str, name: &str) -> String {
    let Some(a) = attr(tag, name) else {
        return tag.to_owned();
    };
    let head = tag[..a.start].trim_end();
    format!("{head}{}", &tag[a.end..])
}

// ---------------------------------------------------------------------------
// Region rewriting
// ---------------------------------------------------------------------------

/// Rebuild `region`, replacing each tag for which `f` returns `Some`.
///
/// `f` receives the tag's ordinal within the region, the tag, and its text.
/// Bytes outside replaced tags are copied unchanged.
pub fn rewrite_tags<F>(region: &str, mut f: F) -> Result<String, ScanError>
where
    F: FnMut(usize, &Tag<'_>, &str) -> Option<String>,
{
    let tags = tokenize(region)?;
    let mut out = String::with_capacity(region.len() + region.len() / 8);
    let mut cursor = 0;
    for (ordinal, tag) in tags.iter().enumerate() {
        if let Some(replacement) = f(ordinal, tag, tag.text(region)) {
            out.push_str(&region[cursor..tag.start]);
            out.push_str(&replacement);
            cursor = tag.end;
        }
    }
    out.push_str(&region[cursor..]);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
