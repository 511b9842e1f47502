//! Span-preserving view over the elements of an XML document.
//!
//! Nothing here re-serializes: every element and attribute carries the byte
//! range it occupies in the original text so callers can edit surgically and
//! leave the rest of the file byte-for-byte intact.

use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

/// Tokens: comments, CDATA, processing instructions and declarations are
/// matched (and ignored) so tags inside them are never mistaken for elements.
const TAG_PATTERN: &str = r#"(?s)<!--.*?-->|<!\[CDATA\[.*?\]\]>|<\?.*?\?>|<![A-Za-z][^>]*>|<(/?)([A-Za-z_][\w:.\-]*)((?:"[^"]*"|'[^']*'|[^>"'])*?)(/?)>"#;

/// One attribute inside a start tag; `value` is unescaped.
const ATTRIBUTE_PATTERN: &str = r#"\s+([A-Za-z_][\w:.\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#;

/// Compiled `TAG_PATTERN`, shared by every parse.
static TAG: LazyLock<Regex> = LazyLock::new(|| return Regex::new(TAG_PATTERN).expect("valid regex"));

/// Compiled `ATTRIBUTE_PATTERN`, shared by every parse.
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| return Regex::new(ATTRIBUTE_PATTERN).expect("valid regex"));

/// An attribute and the bytes it occupies.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Attribute name as written.
    pub name: String,
    /// Byte range from the whitespace preceding the name to the closing quote.
    pub span: Range<usize>,
    /// Unescaped attribute value.
    pub value: String,
}

/// An element and the bytes it occupies.
#[derive(Debug, Clone)]
pub struct Element {
    /// Attributes in source order.
    pub attributes: Vec<Attribute>,
    /// Offset right after the last attribute (or the tag name): where a new
    /// attribute can be inserted.
    pub attributes_end: usize,
    /// Byte range of the end tag; `None` for self-closing elements.
    pub end_tag: Option<Range<usize>>,
    /// Element name as written (including any prefix).
    pub name: String,
    /// Index of the enclosing element.
    pub parent: Option<usize>,
    /// Byte range of the start tag, `<` through `>`.
    pub start_tag: Range<usize>,
}

impl Element {
    /// Value of the first attribute with this name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        return self.attributes.iter().find(|a| return a.name == name);
    }

    /// Bytes between the start and end tags; empty for self-closing elements.
    pub fn inner(&self) -> Range<usize> {
        return match &self.end_tag {
            None => self.start_tag.end..self.start_tag.end,
            Some(end) => self.start_tag.end..end.start,
        };
    }

    /// Name without a namespace prefix.
    pub fn local_name(&self) -> &str {
        return self.name.rsplit(':').next().unwrap_or(&self.name);
    }

    /// Byte range of the whole element, start tag through end tag.
    pub fn outer(&self) -> Range<usize> {
        return match &self.end_tag {
            None => self.start_tag.clone(),
            Some(end) => self.start_tag.start..end.end,
        };
    }
}

/// Every element of a document, in document order.
#[derive(Debug)]
pub struct Document {
    /// Elements in the order their start tags appear.
    pub elements: Vec<Element>,
}

impl Document {
    /// Direct children of the element at `index`.
    pub fn children(&self, index: usize) -> impl Iterator<Item = (usize, &Element)> {
        return self
            .elements
            .iter()
            .enumerate()
            .filter(move |(_, e)| return e.parent == Some(index));
    }

    /// Elements with the given local name, in document order.
    pub fn named<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = (usize, &'a Element)> {
        return self
            .elements
            .iter()
            .enumerate()
            .filter(move |(_, e)| return e.local_name() == local_name);
    }

    /// Scan `content` into elements.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedInput` for mismatched or unclosed tags and
    /// invalid attribute escapes.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded patterns are invalid (compile-time invariant).
    pub fn parse(file: &Path, content: &str) -> Result<Self, Error> {
        let mut elements: Vec<Element> = Vec::new();
        let mut open: Vec<usize> = Vec::new();

        for cap in TAG.captures_iter(content) {
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(2)) else {
                continue;
            };
            let is_end = cap.get(1).is_some_and(|m| return !m.is_empty());
            let is_self_closing = cap.get(4).is_some_and(|m| return !m.is_empty());

            if is_end {
                close_element(file, &mut elements, &mut open, name.as_str(), whole.range())?;
                continue;
            }

            let (attributes, attributes_end) = match cap.get(3) {
                None => (Vec::new(), name.end()),
                Some(body) => parse_attributes(file, &ATTRIBUTE, content, body.range(), name.end())?,
            };
            elements.push(Element {
                attributes,
                attributes_end,
                end_tag: None,
                name: name.as_str().to_string(),
                parent: open.last().copied(),
                start_tag: whole.range(),
            });
            if !is_self_closing {
                open.push(elements.len().saturating_sub(1));
            }
        }

        if let Some(&unclosed) = open.last() {
            let name = elements.get(unclosed).map_or("?", |e| return e.name.as_str());
            return Err(Error::malformed(file, format!("element <{name}> is never closed")));
        }

        return Ok(Self { elements });
    }

    /// Trimmed, unescaped text content of the element at `index`.
    pub fn text(&self, content: &str, index: usize) -> Option<String> {
        let element = self.elements.get(index)?;
        let raw = content.get(element.inner())?.trim();
        return quick_xml::escape::unescape(raw).ok().map(std::borrow::Cow::into_owned);
    }
}

/// Match an end tag to the innermost open element.
///
/// # Errors
///
/// Returns `Error::MalformedInput` if the end tag does not close the innermost element.
fn close_element(
    file: &Path,
    elements: &mut [Element],
    open: &mut Vec<usize>,
    name: &str,
    span: Range<usize>,
) -> Result<(), Error> {
    let Some(index) = open.pop() else {
        return Err(Error::malformed(file, format!("unexpected </{name}> at byte {}", span.start)));
    };
    let Some(element) = elements.get_mut(index) else {
        return Err(Error::malformed(file, "element stack out of sync"));
    };
    if element.name != name {
        return Err(Error::malformed(
            file,
            format!("</{name}> at byte {} closes <{}>", span.start, element.name),
        ));
    }
    element.end_tag = Some(span);
    return Ok(());
}

/// Parse the attribute section of a start tag. Returns the attributes with
/// absolute spans and the offset right after the last one.
///
/// # Errors
///
/// Returns `Error::MalformedInput` if a value contains an invalid escape.
fn parse_attributes(
    file: &Path,
    pattern: &Regex,
    content: &str,
    body: Range<usize>,
    name_end: usize,
) -> Result<(Vec<Attribute>, usize), Error> {
    let text = content.get(body.clone()).unwrap_or("");
    let mut attributes = Vec::new();
    let mut end = name_end;

    for cap in pattern.captures_iter(text) {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let raw = cap.get(2).or_else(|| return cap.get(3)).map_or("", |m| return m.as_str());
        let value = quick_xml::escape::unescape(raw).map_err(|e| {
            return Error::malformed(file, format!("attribute {}: {e}", name.as_str()));
        })?;
        let span = body.start.saturating_add(whole.start())..body.start.saturating_add(whole.end());
        end = span.end;
        attributes.push(Attribute {
            name: name.as_str().to_string(),
            span,
            value: value.into_owned(),
        });
    }

    return Ok((attributes, end));
}
