//! MIME content model for retrieved messages
//!
//! A [`ParsedMessage`] owns the raw lines of one message and the part
//! tree built from them. Parts live in a single list in depth-first
//! pre-order (root first); containers point at their children by
//! index. Every traversal starts again from that list, so iterators can
//! be taken as often as needed.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use mailparse::body::Body;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use serde::Serialize;
use tracing::warn;

/// The headers surfaced by [`ParsedMessage::headers`].
///
/// Every field is present; a header the message lacks is `None`.
/// Values are returned as sent (unfolded, not RFC 2047 decoded).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Headers {
    pub from: Option<String>,
    pub to: Option<String>,
    pub delivered_to: Option<String>,
    pub in_reply_to: Option<String>,
    pub return_path: Option<String>,
    pub date: Option<String>,
    pub subject: Option<String>,
}

impl Headers {
    /// Wire name and value of every field, in declaration order.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("From", self.from.as_deref()),
            ("To", self.to.as_deref()),
            ("Delivered-To", self.delivered_to.as_deref()),
            ("In-Reply-To", self.in_reply_to.as_deref()),
            ("Return-Path", self.return_path.as_deref()),
            ("Date", self.date.as_deref()),
            ("Subject", self.subject.as_deref()),
        ]
    }
}

/// Payload of one part, taken on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub content_type: String,
    /// Transfer-decoded bytes; `None` for multipart containers.
    pub payload: Option<Vec<u8>>,
}

/// What a part holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    /// Transfer-decoded payload of a leaf part.
    Leaf(Vec<u8>),
    /// Indices of the child parts of a `multipart/*` container.
    Multipart(Vec<usize>),
}

/// One MIME part.
#[derive(Debug, Clone)]
pub struct Part {
    content_type: String,
    charset: Option<String>,
    filename: Option<String>,
    attachment: bool,
    depth: usize,
    body: PartBody,
}

impl Part {
    fn describe(mail: &ParsedMail<'_>, depth: usize) -> Self {
        // Parts below the root sit inside a multipart body.
        let enclosed = depth > 0;
        let content_type = mail.ctype.mimetype.clone();
        let declared_charset = mail
            .headers
            .get_first_value("Content-Type")
            .is_some_and(|v| v.to_ascii_lowercase().contains("charset="));
        let disposition = mail.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| mail.ctype.params.get("name"))
            .cloned();

        let body = if is_multipart(&content_type) {
            PartBody::Multipart(Vec::new())
        } else {
            PartBody::Leaf(leaf_payload(mail, enclosed))
        };

        Self {
            charset: declared_charset.then(|| mail.ctype.charset.clone()),
            attachment: disposition.disposition == DispositionType::Attachment,
            content_type,
            filename,
            depth,
            body,
        }
    }

    /// Lowercase `type/subtype`.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Charset named in the `Content-Type` header, if any.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Marked `Content-Disposition: attachment` or carries a filename.
    #[must_use]
    pub const fn is_attachment(&self) -> bool {
        self.attachment || self.filename.is_some()
    }

    /// Nesting level; the root is 0.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.body, PartBody::Multipart(_))
    }

    #[must_use]
    pub const fn body(&self) -> &PartBody {
        &self.body
    }

    /// Decoded payload bytes, `None` for containers.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.body {
            PartBody::Leaf(payload) => Some(payload.as_slice()),
            PartBody::Multipart(_) => None,
        }
    }

    /// The payload as text: UTF-8, or the declared charset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are invalid under that
    /// charset or the charset is unknown.
    pub fn text(&self) -> Result<String> {
        decode_text(&self.content_type, self.charset(), self.payload().unwrap_or_default())
    }

    /// Snapshot of this part's type and payload.
    #[must_use]
    pub fn content(&self) -> Content {
        Content {
            content_type: self.content_type.clone(),
            payload: self.payload().map(<[u8]>::to_vec),
        }
    }
}

/// A retrieved message and its MIME part tree.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    raw: Vec<Vec<u8>>,
    headers: Vec<(String, String)>,
    parts: Vec<Part>,
}

impl ParsedMessage {
    /// Build the model from the raw lines returned by `RETR` or `TOP`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the MIME structure cannot be parsed.
    pub fn from_lines(raw: Vec<Vec<u8>>) -> Result<Self> {
        let joined = raw.join(&b"\r\n"[..]);
        let mail = mailparse::parse_mail(&joined).map_err(|e| Error::Parse(e.to_string()))?;

        let headers = mail
            .headers
            .iter()
            .map(|h| (h.get_key(), unfold(h.get_value_raw())))
            .collect();

        let mut parts = Vec::new();
        collect_parts(&mail, 0, &mut parts);

        Ok(Self {
            raw,
            headers,
            parts,
        })
    }

    /// The lines this message was built from.
    #[must_use]
    pub fn raw_lines(&self) -> &[Vec<u8>] {
        &self.raw
    }

    #[must_use]
    pub fn headers(&self) -> Headers {
        Headers {
            from: self.header("From"),
            to: self.header("To"),
            delivered_to: self.header("Delivered-To"),
            in_reply_to: self.header("In-Reply-To"),
            return_path: self.header("Return-Path"),
            date: self.header("Date"),
            subject: self.header("Subject"),
        }
    }

    /// First top-level header named `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    /// The `Date` header as a timestamp, if it parses.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        let date = self.header("Date")?;
        let timestamp = mailparse::dateparse(&date).ok()?;
        DateTime::from_timestamp(timestamp, 0)
    }

    /// The message itself.
    #[must_use]
    pub fn root(&self) -> &Part {
        &self.parts[0]
    }

    /// All parts, depth-first, root first.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Direct children of `part` (empty for leaves).
    pub fn children<'a>(&'a self, part: &'a Part) -> impl Iterator<Item = &'a Part> + 'a {
        let indices: &[usize] = match &part.body {
            PartBody::Multipart(children) => children,
            PartBody::Leaf(_) => &[],
        };
        indices.iter().map(|&i| &self.parts[i])
    }

    /// Payloads of the leaf parts whose content type starts with
    /// `prefix`, in part order.
    pub fn iter_content_of_type<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.matching(prefix).filter_map(Part::payload)
    }

    /// Like [`Self::iter_content_of_type`], decoded to text.
    ///
    /// Each item fails on its own; a part in an unexpected charset does
    /// not end the iteration.
    pub fn iter_text<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = Result<String>> + 'a {
        self.matching(prefix)
            .filter(|part| !part.is_multipart())
            .map(Part::text)
    }

    pub fn iter_text_plain(&self) -> impl Iterator<Item = Result<String>> + '_ {
        self.iter_text("text/plain")
    }

    pub fn iter_html(&self) -> impl Iterator<Item = Result<String>> + '_ {
        self.iter_text("text/html")
    }

    pub fn iter_images(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.iter_content_of_type("image/")
    }

    pub fn iter_applications(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.iter_content_of_type("application/")
    }

    /// Leaf parts marked as attachments or carrying a filename.
    pub fn iter_attachments(&self) -> impl Iterator<Item = &Part> + '_ {
        self.parts
            .iter()
            .filter(|part| !part.is_multipart() && part.is_attachment())
    }

    /// Every `text/plain` body joined with newlines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if any plain text part cannot be
    /// decoded.
    pub fn plain_text(&self) -> Result<String> {
        let bodies = self.iter_text_plain().collect::<Result<Vec<_>>>()?;
        Ok(bodies.join("\n"))
    }

    /// One [`Content`] per part, payloads left undecoded.
    #[must_use]
    pub fn contents(&self) -> Vec<Content> {
        self.parts.iter().map(Part::content).collect()
    }

    fn matching<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Part> + 'a {
        self.parts
            .iter()
            .filter(move |part| part.content_type.starts_with(prefix))
    }
}

fn collect_parts(mail: &ParsedMail<'_>, depth: usize, parts: &mut Vec<Part>) -> usize {
    let index = parts.len();
    parts.push(Part::describe(mail, depth));

    if parts[index].is_multipart() {
        let children = mail
            .subparts
            .iter()
            .map(|sub| collect_parts(sub, depth + 1, parts))
            .collect();
        parts[index].body = PartBody::Multipart(children);
    }

    index
}

fn is_multipart(content_type: &str) -> bool {
    content_type
        .split('/')
        .next()
        .is_some_and(|top| top.eq_ignore_ascii_case("multipart"))
}

/// Transfer-decoded body, or the raw body if the transfer encoding is
/// broken.
///
/// Inside a multipart, the line break before the next boundary belongs
/// to the delimiter (RFC 2046 section 5.1.1), not to the part.
fn leaf_payload(mail: &ParsedMail<'_>, enclosed: bool) -> Vec<u8> {
    let encoded = mail.get_body_encoded();
    let base64 = matches!(encoded, Body::Base64(_));

    let mut payload = mail.get_body_raw().unwrap_or_else(|e| {
        warn!("Keeping undecoded {} body: {}", mail.ctype.mimetype, e);
        match &encoded {
            Body::Base64(body) | Body::QuotedPrintable(body) => body.get_raw().to_vec(),
            Body::SevenBit(body) | Body::EightBit(body) => body.get_raw().to_vec(),
            Body::Binary(body) => body.get_raw().to_vec(),
        }
    });

    if enclosed && !base64 {
        if payload.ends_with(b"\r\n") {
            payload.truncate(payload.len() - 2);
        } else if payload.ends_with(b"\n") {
            payload.pop();
        }
    }
    payload
}

fn decode_text(content_type: &str, charset: Option<&str>, bytes: &[u8]) -> Result<String> {
    let decode_error = |charset: &str| Error::Decode {
        content_type: content_type.to_string(),
        charset: charset.to_string(),
    };

    let Some(label) = charset else {
        return String::from_utf8(bytes.to_vec()).map_err(|_| decode_error("utf-8"));
    };

    let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| decode_error(label))?;
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(std::borrow::Cow::into_owned)
        .ok_or_else(|| decode_error(label))
}

/// Undo header folding (RFC 5322 section 2.2.3).
fn unfold(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .replace("\r\n", "")
        .replace('\n', "")
        .trim()
        .to_string()
}
