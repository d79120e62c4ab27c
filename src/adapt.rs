//! Wrapping combinators that transform another construct's bytes or values.

use sha2::{Digest, Sha256};

use crate::construct::Construct;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::primitive::{Bytes, Pass};
use crate::stream::Stream;
use crate::value::Value;

type ValueFn = Box<dyn Fn(Value) -> Result<Value>>;

/// Which side of the payload receives pad bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Pad (and strip) on the left.
    Left,
    /// Pad (and strip) on the right.
    Right,
    /// Pad on both sides, the larger half on the right.
    Center,
}

/// Transforms values on their way in and out of the wrapped construct; the
/// bytes themselves are untouched.
pub struct Adapted {
    inner: Box<dyn Construct>,
    before_build: Option<ValueFn>,
    after_parse: Option<ValueFn>,
}

impl Adapted {
    /// Wrap a construct without any transformation yet.
    pub fn new(inner: impl Construct + 'static) -> Self {
        Self {
            inner: inner.boxed(),
            before_build: None,
            after_parse: None,
        }
    }

    /// Run `func` on the value before delegating a build.
    pub fn before_build(mut self, func: impl Fn(Value) -> Result<Value> + 'static) -> Self {
        self.before_build = Some(Box::new(func));
        self
    }

    /// Run `func` on the value the wrapped construct parsed.
    pub fn after_parse(mut self, func: impl Fn(Value) -> Result<Value> + 'static) -> Self {
        self.after_parse = Some(Box::new(func));
        self
    }
}

impl Construct for Adapted {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        match &self.before_build {
            Some(func) => {
                let adapted = func(value.clone())?;
                self.inner.build_stream(&adapted, stream, context)
            }
            None => self.inner.build_stream(value, stream, context),
        }
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let parsed = self.inner.parse_stream(stream, context)?;
        match &self.after_parse {
            Some(func) => func(parsed),
            None => Ok(parsed),
        }
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.inner.size(context)
    }

    fn describe(&self) -> String {
        format!("Adapted({})", self.inner.describe())
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}

/// Length-prefixed construct.
///
/// Parsing reads the length field, extracts exactly that many bytes, and
/// runs the wrapped construct against the extracted slice only, so greedy
/// constructs inside are bounded. Building emits the payload length through
/// the length field, then the payload.
pub struct Prefixed {
    inner: Box<dyn Construct>,
    length_field: Box<dyn Construct>,
}

impl Prefixed {
    /// Prefix `inner` with its length built by `length_field`.
    pub fn new(inner: impl Construct + 'static, length_field: impl Construct + 'static) -> Self {
        Self {
            inner: inner.boxed(),
            length_field: length_field.boxed(),
        }
    }
}

fn value_length(value: &Value) -> Result<usize> {
    match value {
        Value::Bytes(b) => Ok(b.len()),
        Value::Str(s) => Ok(s.len()),
        Value::Seq(s) => Ok(s.len()),
        _ => Err(Error::build(format!(
            "cannot take the length of {}",
            value.kind()
        ))),
    }
}

impl Construct for Prefixed {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        let length = value_length(value)?;
        self.length_field
            .build_stream(&Value::Int(length as i128), stream, context)?;
        self.inner.build_stream(value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let length = self.length_field.parse_stream(stream, context)?;
        let length = length
            .as_int()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Error::parse(format!("invalid payload length {length:?}")))?;
        let data = stream.read_exact(length)?;
        let mut sub = Stream::from(data);
        self.inner.parse_stream(&mut sub, context)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        Ok(self.length_field.size(context)? + self.inner.size(context)?)
    }

    fn describe(&self) -> String {
        format!(
            "Prefixed({}, length_field={})",
            self.inner.describe(),
            self.length_field.describe()
        )
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}

/// Pads the wrapped construct's bytes to an exact total length.
///
/// Building renders the wrapped construct into a scratch buffer first, pads
/// it, and emits the padded run. Parsing reads the full run, strips the pad
/// bytes from the configured side, and hands the remainder to the wrapped
/// construct through an isolated sub-stream.
pub struct Padded {
    inner: Box<dyn Construct>,
    length: usize,
    pad: u8,
    direction: Direction,
}

impl Padded {
    /// Pad `inner` to exactly `length` bytes with zeroes on the right.
    pub fn new(inner: impl Construct + 'static, length: usize) -> Self {
        Self {
            inner: inner.boxed(),
            length,
            pad: 0,
            direction: Direction::Right,
        }
    }

    /// Use `pad` instead of zero.
    pub fn pad_with(mut self, pad: u8) -> Self {
        self.pad = pad;
        self
    }

    /// Pad towards the given side.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    fn apply_padding(&self, mut data: Vec<u8>) -> Vec<u8> {
        if data.len() >= self.length {
            return data;
        }
        let missing = self.length - data.len();
        match self.direction {
            Direction::Right => data.extend(std::iter::repeat(self.pad).take(missing)),
            Direction::Left => {
                let mut padded = vec![self.pad; missing];
                padded.extend_from_slice(&data);
                data = padded;
            }
            Direction::Center => {
                let left = missing / 2;
                let mut padded = vec![self.pad; left];
                padded.extend_from_slice(&data);
                padded.extend(std::iter::repeat(self.pad).take(missing - left));
                data = padded;
            }
        }
        data
    }

    fn strip_padding<'a>(&self, mut data: &'a [u8]) -> &'a [u8] {
        if matches!(self.direction, Direction::Left | Direction::Center) {
            while let Some((first, rest)) = data.split_first() {
                if *first != self.pad {
                    break;
                }
                data = rest;
            }
        }
        if matches!(self.direction, Direction::Right | Direction::Center) {
            while let Some((last, rest)) = data.split_last() {
                if *last != self.pad {
                    break;
                }
                data = rest;
            }
        }
        data
    }
}

impl Construct for Padded {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        let mut scratch = Stream::new();
        let context_value = self.inner.build_stream(value, &mut scratch, context)?;
        stream.write(&self.apply_padding(scratch.into_bytes()));
        Ok(context_value)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let data = stream.read_exact(self.length)?;
        let mut sub = Stream::from(self.strip_padding(&data));
        self.inner.parse_stream(&mut sub, context)
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Ok(self.length)
    }

    fn describe(&self) -> String {
        format!("Padded({}, length={})", self.inner.describe(), self.length)
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}

/// Pads the wrapped construct to the next multiple of a block length.
///
/// Parsing verifies that every pad byte read back matches the configured
/// pad value.
pub struct Aligned {
    inner: Box<dyn Construct>,
    length: usize,
    pad: u8,
}

impl Aligned {
    /// Align `inner` to multiples of `length` bytes, padding with zeroes.
    pub fn new(inner: impl Construct + 'static, length: usize) -> Self {
        assert!(length > 0, "alignment length must be > 0");
        Self {
            inner: inner.boxed(),
            length,
            pad: 0,
        }
    }

    /// Use `pad` instead of zero.
    pub fn pad_with(mut self, pad: u8) -> Self {
        self.pad = pad;
        self
    }

    fn pad_length(&self, consumed: usize) -> usize {
        (self.length - consumed % self.length) % self.length
    }
}

impl Construct for Aligned {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        let before = stream.tell();
        let context_value = self.inner.build_stream(value, stream, context)?;
        let padding = self.pad_length(stream.tell().saturating_sub(before));
        stream.write(&vec![self.pad; padding]);
        Ok(context_value)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let before = stream.tell();
        let parsed = self.inner.parse_stream(stream, context)?;
        let padding = self.pad_length(stream.tell().saturating_sub(before));
        let read = stream.read(padding);
        if read != vec![self.pad; padding] {
            return Err(Error::parse(format!(
                "must read padding of {}, got {}",
                hex::encode(vec![self.pad; padding]),
                hex::encode(&read)
            )));
        }
        Ok(parsed)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        let size = self.inner.size(context)?;
        Ok(size + self.pad_length(size))
    }

    fn describe(&self) -> String {
        format!("Aligned({}, length={})", self.inner.describe(), self.length)
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}

/// A run of pad bytes carrying no data: builds pad bytes regardless of the
/// input, parses to null.
pub struct Padding {
    inner: Padded,
    length: usize,
}

impl Padding {
    /// Exactly `length` zero bytes.
    pub fn new(length: usize) -> Self {
        Self {
            inner: Padded::new(Pass, length),
            length,
        }
    }

    /// Use `pad` instead of zero.
    pub fn pad_with(mut self, pad: u8) -> Self {
        self.inner = self.inner.pad_with(pad);
        self
    }
}

impl Construct for Padding {
    fn build_stream(
        &self,
        _value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        self.inner.build_stream(&Value::Null, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        self.inner.parse_stream(stream, context)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.inner.size(context)
    }

    fn describe(&self) -> String {
        format!("Padding({})", self.length)
    }
}

/// Runs the wrapped construct at an absolute stream offset, then restores
/// the position it started from.
///
/// The size is the wrapped construct's size even though the traversed bytes
/// differ; the usual use is a region whose location is declared elsewhere
/// in a header.
pub struct Offset {
    inner: Box<dyn Construct>,
    offset: usize,
}

impl Offset {
    /// Run `inner` at the absolute position `offset`.
    pub fn new(inner: impl Construct + 'static, offset: usize) -> Self {
        Self {
            inner: inner.boxed(),
            offset,
        }
    }
}

impl Construct for Offset {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        let fallback = stream.tell();
        stream.seek(self.offset);
        let context_value = self.inner.build_stream(value, stream, context)?;
        stream.seek(fallback);
        Ok(context_value)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let fallback = stream.tell();
        stream.seek(self.offset);
        let parsed = self.inner.parse_stream(stream, context)?;
        stream.seek(fallback);
        Ok(parsed)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.inner.size(context)
    }

    fn describe(&self) -> String {
        format!("Offset({}, offset={})", self.inner.describe(), self.offset)
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}

/// A digest over context-supplied data, stored through the wrapped
/// construct (normally a fixed-width byte run).
///
/// Building from null writes the computed digest and reports it as the
/// context value; building from explicit bytes verifies them first.
/// Parsing recomputes the digest and fails on mismatch.
pub struct Checksum {
    inner: Box<dyn Construct>,
    hash: Box<dyn Fn(&[u8]) -> Vec<u8>>,
    data: Box<dyn Fn(&Context) -> Result<Vec<u8>>>,
}

impl Checksum {
    /// Checksum with an arbitrary digest function.
    pub fn new(
        inner: impl Construct + 'static,
        hash: impl Fn(&[u8]) -> Vec<u8> + 'static,
        data: impl Fn(&Context) -> Result<Vec<u8>> + 'static,
    ) -> Self {
        Self {
            inner: inner.boxed(),
            hash: Box::new(hash),
            data: Box::new(data),
        }
    }

    /// SHA-256 checksum over `data`, stored as a 32-byte run.
    pub fn sha256(data: impl Fn(&Context) -> Result<Vec<u8>> + 'static) -> Self {
        Self::new(
            Bytes::exact(32),
            |input| Sha256::digest(input).to_vec(),
            data,
        )
    }

    fn digest(&self, context: &Context) -> Result<Vec<u8>> {
        let data = (self.data)(context)?;
        Ok((self.hash)(&data))
    }
}

impl Construct for Checksum {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        let digest = self.digest(context)?;
        match value {
            Value::Null => {}
            Value::Bytes(provided) if *provided == digest => {}
            Value::Bytes(provided) => {
                return Err(Error::build(format!(
                    "wrong checksum, provided {} but expected {}",
                    hex::encode(provided),
                    hex::encode(&digest)
                )))
            }
            other => {
                return Err(Error::build(format!(
                    "expected checksum bytes or null, got {}",
                    other.kind()
                )))
            }
        }
        self.inner
            .build_stream(&Value::Bytes(digest.clone()), stream, context)?;
        Ok(Some(Value::Bytes(digest)))
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let parsed = self.inner.parse_stream(stream, context)?;
        let bytes = parsed
            .as_bytes()
            .ok_or_else(|| Error::parse(format!("expected checksum bytes, got {}", parsed.kind())))?;
        let expected = self.digest(context)?;
        if bytes != expected {
            return Err(Error::parse(format!(
                "wrong checksum, parsed {} but expected {}",
                hex::encode(bytes),
                hex::encode(&expected)
            )));
        }
        Ok(parsed)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.inner.size(context)
    }

    fn describe(&self) -> String {
        format!("Checksum({})", self.inner.describe())
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}
