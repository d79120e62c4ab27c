//! Text constructs: fixed-width, length-prefixed, and terminated strings.
//!
//! Each of these is assembled from the crate's own combinators, the same
//! way a user would compose them; the structs only add naming, encoding,
//! and size reporting on top.

use crate::adapt::{Adapted, Direction, Padded, Prefixed};
use crate::construct::Construct;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::primitive::Bytes;
use crate::repeat::Repeat;
use crate::stream::Stream;
use crate::value::Value;

/// Supported text encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8.
    Utf8,
    /// ISO 8859-1, a byte per character.
    Latin1,
}

impl Encoding {
    fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin-1",
        }
    }

    fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        Error::build(format!("cannot encode {c:?} as latin-1"))
                    })
                })
                .collect(),
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::parse(format!("invalid utf-8 data: {e}"))),
            Encoding::Latin1 => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
        }
    }
}

/// Encodes text before building and decodes bytes after parsing.
///
/// Without an encoding, values pass through untouched and the construct
/// works on raw bytes.
pub struct StringEncoded {
    inner: Box<dyn Construct>,
    encoding: Option<Encoding>,
}

impl StringEncoded {
    /// Wrap `inner` with an optional text encoding.
    pub fn new(inner: impl Construct + 'static, encoding: Option<Encoding>) -> Self {
        Self {
            inner: inner.boxed(),
            encoding,
        }
    }
}

impl Construct for StringEncoded {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        match self.encoding {
            Some(encoding) => {
                let text = value.as_str().ok_or_else(|| {
                    Error::build(format!("expected text, got {}", value.kind()))
                })?;
                let bytes = Value::Bytes(encoding.encode(text)?);
                self.inner.build_stream(&bytes, stream, context)
            }
            None => self.inner.build_stream(value, stream, context),
        }
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let parsed = self.inner.parse_stream(stream, context)?;
        match self.encoding {
            Some(encoding) => {
                let bytes = parsed.as_bytes().ok_or_else(|| {
                    Error::parse(format!("expected bytes to decode, got {}", parsed.kind()))
                })?;
                Ok(Value::Str(encoding.decode(bytes)?))
            }
            None => Ok(parsed),
        }
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.inner.size(context)
    }

    fn describe(&self) -> String {
        match self.encoding {
            Some(encoding) => format!(
                "StringEncoded({}, encoding={})",
                self.inner.describe(),
                encoding.name()
            ),
            None => format!("StringEncoded({})", self.inner.describe()),
        }
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}

fn join_items(value: Value, drop: usize) -> Result<Value> {
    let items = value
        .as_seq()
        .ok_or_else(|| Error::parse(format!("expected a sequence, got {}", value.kind())))?;
    let take = items.len().saturating_sub(drop);
    let mut out = Vec::with_capacity(take);
    for item in &items[..take] {
        match item {
            Value::Bytes(bytes) => out.extend_from_slice(bytes),
            other => {
                return Err(Error::parse(format!(
                    "expected single-byte items, got {}",
                    other.kind()
                )))
            }
        }
    }
    Ok(Value::Bytes(out))
}

/// Text occupying a constant number of bytes, padded and stripped on the
/// configured side.
///
/// The payload must render to between one and `length` bytes; longer
/// values have to be truncated by the caller (an `Adapted` in front works).
pub struct PaddedString {
    length: usize,
    encoding: Option<Encoding>,
    pad: u8,
    direction: Direction,
    chain: StringEncoded,
}

impl PaddedString {
    /// Fixed run of `length` bytes, zero-padded on the right.
    pub fn new(length: usize, encoding: Option<Encoding>) -> Self {
        let mut this = Self {
            length,
            encoding,
            pad: 0,
            direction: Direction::Right,
            chain: StringEncoded::new(Bytes::exact(0), None),
        };
        this.assemble();
        this
    }

    /// Use `pad` instead of zero.
    pub fn pad_with(mut self, pad: u8) -> Self {
        self.pad = pad;
        self.assemble();
        self
    }

    /// Pad towards the given side.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self.assemble();
        self
    }

    fn assemble(&mut self) {
        let variable = Adapted::new(Repeat::new(Bytes::exact(1), 1, self.length + 1))
            .after_parse(|v| join_items(v, 0));
        let padded = Padded::new(variable, self.length)
            .pad_with(self.pad)
            .direction(self.direction);
        self.chain = StringEncoded::new(padded, self.encoding);
    }
}

impl Construct for PaddedString {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        self.chain.build_stream(value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        self.chain.parse_stream(stream, context)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.chain.size(context)
    }

    fn describe(&self) -> String {
        format!("PaddedString({})", self.length)
    }
}

/// Length-prefixed string; no fixed size.
pub struct PascalString {
    chain: StringEncoded,
}

impl PascalString {
    /// Prefix the payload with its length built by `length_field`.
    pub fn new(length_field: impl Construct + 'static, encoding: Option<Encoding>) -> Self {
        Self {
            chain: StringEncoded::new(Prefixed::new(Bytes::greedy(), length_field), encoding),
        }
    }
}

impl Construct for PascalString {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        self.chain.build_stream(value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        self.chain.parse_stream(stream, context)
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Err(Error::size("PascalString has no fixed size"))
    }

    fn describe(&self) -> String {
        "PascalString".into()
    }
}

fn terminated(terminator: &'static [u8]) -> Adapted {
    let until = move |items: &[Value]| {
        items.len() >= terminator.len()
            && items[items.len() - terminator.len()..]
                .iter()
                .zip(terminator)
                .all(|(item, byte)| item == &Value::Bytes(vec![*byte]))
    };
    Adapted::new(Repeat::new(Bytes::exact(1), 0, usize::MAX).until(until))
        .before_build(move |value| {
            let bytes = value
                .as_bytes()
                .ok_or_else(|| Error::build(format!("expected bytes, got {}", value.kind())))?;
            let mut out = bytes.to_vec();
            out.extend_from_slice(terminator);
            Ok(Value::Bytes(out))
        })
        .after_parse(move |value| join_items(value, terminator.len()))
}

/// String ending in a zero byte; the terminator is stripped on parse.
pub struct CString {
    chain: StringEncoded,
}

impl CString {
    /// Zero-terminated run with an optional text encoding.
    pub fn new(encoding: Option<Encoding>) -> Self {
        Self {
            chain: StringEncoded::new(terminated(b"\x00"), encoding),
        }
    }
}

impl Construct for CString {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        self.chain.build_stream(value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        self.chain.parse_stream(stream, context)
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Err(Error::size("CString has no fixed size"))
    }

    fn describe(&self) -> String {
        "CString".into()
    }
}

/// String ending in CRLF, the staple of text-based network protocols.
///
/// Text is carried as latin-1 by default; `Line::raw` works on bytes.
pub struct Line {
    chain: StringEncoded,
}

impl Line {
    /// Latin-1 encoded line.
    pub fn new() -> Self {
        Self {
            chain: StringEncoded::new(terminated(b"\r\n"), Some(Encoding::Latin1)),
        }
    }

    /// Raw byte line without any encoding.
    pub fn raw() -> Self {
        Self {
            chain: StringEncoded::new(terminated(b"\r\n"), None),
        }
    }
}

impl Default for Line {
    fn default() -> Self {
        Self::new()
    }
}

impl Construct for Line {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        self.chain.build_stream(value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        self.chain.parse_stream(stream, context)
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Err(Error::size("Line has no fixed size"))
    }

    fn describe(&self) -> String {
        "Line".into()
    }
}
