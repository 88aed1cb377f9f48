//! XML processing for SAML messages.
//!
//! Parsing is done with quick-xml's pull reader. Signature handling needs to
//! know where elements start and end in the original text, so
//! [`index_elements`] records the byte span, depth, `ID` attribute and
//! namespace declarations of every element in a document. Signed fragments
//! are put into canonical form with [`canonicalize`].

mod parse;
mod write;

pub use parse::{parse_authn_request, MAX_ISSUER_LENGTH, MAX_REQUEST_ID_LENGTH};
pub(crate) use write::push_attr;
pub use write::{
    assertion_xml, authn_request_xml, encrypted_assertion_xml, format_instant, response_xml,
    status_xml,
};

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use xml_canonicalization::Canonicalizer;

use crate::error::{SamlError, SamlResult};

/// Location of an element in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpan {
    /// Qualified name, including any prefix.
    pub name: String,
    /// Local name without prefix.
    pub local: String,
    /// Nesting depth, zero for the document element.
    pub depth: usize,
    /// Byte offset of the opening `<`.
    pub start: usize,
    /// Byte offset just past the start tag. Equal to `end` for empty elements.
    pub content_start: usize,
    /// Byte offset just past the closing `>`.
    pub end: usize,
    /// Value of the `ID` attribute, if present.
    pub id: Option<String>,
    /// Namespace declarations on this element as `(prefix, uri)`. The
    /// default namespace has an empty prefix.
    pub namespaces: Vec<(String, String)>,
}

impl ElementSpan {
    /// Returns the element's text in `xml`.
    #[must_use]
    pub fn slice<'a>(&self, xml: &'a str) -> &'a str {
        &xml[self.start..self.end]
    }

    /// Returns true if this element has no content.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.content_start == self.end
    }

    /// Returns true if `other` is a direct child of this element.
    #[must_use]
    pub const fn is_parent_of(&self, other: &Self) -> bool {
        other.depth == self.depth + 1 && self.contains(other)
    }

    /// Returns true if `other` lies inside this element.
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        other.start > self.start && other.end <= self.end
    }
}

/// Indexes every element of `xml` in document order.
///
/// Documents with a DOCTYPE are rejected.
pub fn index_elements(xml: &str) -> SamlResult<Vec<ElementSpan>> {
    let mut reader = Reader::from_str(xml);
    let mut spans: Vec<ElementSpan> = Vec::new();
    let mut open: Vec<usize> = Vec::new();

    loop {
        let start = position(&reader)?;
        match reader.read_event()? {
            Event::Start(e) => {
                let mut span = open_span(&e, open.len(), start)?;
                span.content_start = position(&reader)?;
                open.push(spans.len());
                spans.push(span);
            }
            Event::Empty(e) => {
                let mut span = open_span(&e, open.len(), start)?;
                span.end = position(&reader)?;
                span.content_start = span.end;
                spans.push(span);
            }
            Event::End(_) => {
                let index = open
                    .pop()
                    .ok_or_else(|| SamlError::XmlParse("unbalanced end tag".to_string()))?;
                spans[index].end = position(&reader)?;
            }
            Event::DocType(_) => {
                return Err(SamlError::XmlParse("DOCTYPE is not allowed".to_string()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(SamlError::XmlParse("unclosed element".to_string()));
    }
    if spans.is_empty() {
        return Err(SamlError::XmlParse("document has no elements".to_string()));
    }
    Ok(spans)
}

/// Finds the single element carrying `ID="id"`.
///
/// Duplicate IDs are an error: a signature reference to an ambiguous ID
/// could be satisfied by an element other than the one that is processed.
pub fn find_by_id<'a>(spans: &'a [ElementSpan], id: &str) -> SamlResult<&'a ElementSpan> {
    let mut matches = spans.iter().filter(|s| s.id.as_deref() == Some(id));
    let found = matches
        .next()
        .ok_or_else(|| SamlError::MissingElement(format!("element with ID '{id}'")))?;
    if matches.next().is_some() {
        return Err(SamlError::SignatureInvalid(format!("duplicate ID '{id}'")));
    }
    Ok(found)
}

/// Cuts `target` out of `xml` as a standalone fragment.
///
/// Namespace declarations in scope from ancestors are copied onto the
/// fragment's start tag, unless the element redeclares the prefix. When
/// `removed` is given (an enveloped signature), that descendant is left out.
pub fn detach(
    xml: &str,
    spans: &[ElementSpan],
    target: &ElementSpan,
    removed: Option<&ElementSpan>,
) -> String {
    let mut inherited: Vec<(&str, &str)> = Vec::new();
    for ancestor in spans.iter().filter(|s| s.contains(target)) {
        for (prefix, uri) in &ancestor.namespaces {
            inherited.retain(|(p, _)| p != prefix);
            inherited.push((prefix.as_str(), uri.as_str()));
        }
    }
    inherited.retain(|(prefix, _)| !target.namespaces.iter().any(|(p, _)| p == prefix));

    let name_end = target.start + 1 + target.name.len();
    let mut fragment = String::with_capacity(target.end - target.start);
    fragment.push_str(&xml[target.start..name_end]);
    for (prefix, uri) in inherited {
        if prefix.is_empty() {
            fragment.push_str(&format!(r#" xmlns="{}""#, escape(uri)));
        } else {
            fragment.push_str(&format!(r#" xmlns:{prefix}="{}""#, escape(uri)));
        }
    }
    match removed.filter(|r| target.contains(r)) {
        Some(r) => {
            fragment.push_str(&xml[name_end..r.start]);
            fragment.push_str(&xml[r.end..target.end]);
        }
        None => fragment.push_str(&xml[name_end..target.end]),
    }
    fragment
}

/// Exclusive XML canonicalization of a standalone fragment.
pub fn canonicalize(fragment: &str, with_comments: bool) -> SamlResult<String> {
    let mut output = Vec::new();
    Canonicalizer::read_from_str(fragment)
        .write_to_writer(&mut output)
        .canonicalize(with_comments)
        .map_err(|e| SamlError::XmlParse(format!("canonicalization failed: {e}")))?;
    String::from_utf8(output)
        .map_err(|e| SamlError::XmlParse(format!("canonical form is not UTF-8: {e}")))
}

/// Returns the unescaped value of the attribute with the given local name.
pub(crate) fn attribute(element: &BytesStart<'_>, local: &str) -> SamlResult<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Returns the local name of an element as a string.
pub(crate) fn local_name(element: &BytesStart<'_>) -> SamlResult<String> {
    std::str::from_utf8(element.local_name().as_ref())
        .map(str::to_string)
        .map_err(|e| SamlError::XmlParse(e.to_string()))
}

fn open_span(element: &BytesStart<'_>, depth: usize, start: usize) -> SamlResult<ElementSpan> {
    let name = std::str::from_utf8(element.name().as_ref())
        .map_err(|e| SamlError::XmlParse(e.to_string()))?
        .to_string();
    let local = local_name(element)?;
    let mut id = None;
    let mut namespaces = Vec::new();
    for attr in element.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        if key == b"ID" {
            id = Some(attr.unescape_value()?.into_owned());
        } else if key == b"xmlns" || key.starts_with(b"xmlns:") {
            let prefix = std::str::from_utf8(key.get(6..).unwrap_or_default())
                .map_err(|e| SamlError::XmlParse(e.to_string()))?
                .to_string();
            namespaces.push((prefix, attr.unescape_value()?.into_owned()));
        }
    }
    Ok(ElementSpan {
        name,
        local,
        depth,
        start,
        content_start: start,
        end: start,
        id,
        namespaces,
    })
}

fn position(reader: &Reader<&[u8]>) -> SamlResult<usize> {
    usize::try_from(reader.buffer_position())
        .map_err(|_| SamlError::XmlParse("document too large".to_string()))
}
