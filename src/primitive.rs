//! Leaf constructs: fixed-width scalars, byte runs, and zero-size markers.

use crate::construct::Construct;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::stream::Stream;
use crate::value::Value;

/// Byte order of a multi-byte scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Most significant byte first.
    Big,
    /// Least significant byte first.
    Little,
}

impl ByteOrder {
    fn name(self) -> &'static str {
        match self {
            ByteOrder::Big => "big",
            ByteOrder::Little => "little",
        }
    }
}

/// Supported integer widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    /// One byte.
    W1,
    /// Two bytes.
    W2,
    /// Four bytes.
    W4,
    /// Eight bytes.
    W8,
}

impl IntWidth {
    /// Width in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            IntWidth::W1 => 1,
            IntWidth::W2 => 2,
            IntWidth::W4 => 4,
            IntWidth::W8 => 8,
        }
    }
}

/// Supported float widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    /// IEEE 754 binary32.
    W4,
    /// IEEE 754 binary64.
    W8,
}

impl FloatWidth {
    /// Width in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            FloatWidth::W4 => 4,
            FloatWidth::W8 => 8,
        }
    }
}

/// Does nothing: builds no bytes, parses to null, size zero.
///
/// The identity element; useful as the default branch of conditionals.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pass;

impl Construct for Pass {
    fn build_stream(
        &self,
        _value: &Value,
        _stream: &mut Stream,
        _context: &mut Context,
    ) -> Result<Option<Value>> {
        Ok(None)
    }

    fn parse_stream(&self, _stream: &mut Stream, _context: &mut Context) -> Result<Value> {
        Ok(Value::Null)
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Ok(0)
    }

    fn describe(&self) -> String {
        "Pass".into()
    }
}

/// One byte interpreted as a boolean: zero is false, anything else true.
#[derive(Debug, Default, Clone, Copy)]
pub struct Flag;

impl Construct for Flag {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        _context: &mut Context,
    ) -> Result<Option<Value>> {
        let flag = value
            .as_bool()
            .ok_or_else(|| Error::build(format!("expected a boolean, got {}", value.kind())))?;
        stream.write(&[u8::from(flag)]);
        Ok(None)
    }

    fn parse_stream(&self, stream: &mut Stream, _context: &mut Context) -> Result<Value> {
        let byte = stream.read_exact(1)?;
        Ok(Value::Bool(byte[0] != 0))
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Ok(1)
    }

    fn describe(&self) -> String {
        "Flag".into()
    }
}

/// Raw byte run, either of an exact length or greedy.
///
/// A greedy run parses the remainder of the stream, builds whatever it is
/// given, and has no determinate size. An exact run of one byte also
/// accepts an integer in `0..=255` when building, so repeats over
/// single-byte runs can feed it bytes one at a time.
#[derive(Debug, Clone, Copy)]
pub struct Bytes {
    length: Option<usize>,
}

impl Bytes {
    /// Run of exactly `length` bytes.
    pub fn exact(length: usize) -> Self {
        Self {
            length: Some(length),
        }
    }

    /// Run covering the rest of the stream.
    pub fn greedy() -> Self {
        Self { length: None }
    }
}

impl Construct for Bytes {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        _context: &mut Context,
    ) -> Result<Option<Value>> {
        match (value, self.length) {
            (Value::Int(byte), Some(1)) => {
                let byte = u8::try_from(*byte).map_err(|_| {
                    Error::build(format!("single byte value out of range: {byte}"))
                })?;
                stream.write(&[byte]);
            }
            (Value::Bytes(bytes), Some(length)) => {
                if bytes.len() != length {
                    return Err(Error::build(format!(
                        "must build {} bytes, got {}",
                        length,
                        bytes.len()
                    )));
                }
                stream.write(bytes);
            }
            (Value::Bytes(bytes), None) => stream.write(bytes),
            _ => {
                return Err(Error::build(format!(
                    "expected bytes, got {}",
                    value.kind()
                )))
            }
        }
        Ok(None)
    }

    fn parse_stream(&self, stream: &mut Stream, _context: &mut Context) -> Result<Value> {
        let bytes = match self.length {
            Some(length) => stream.read_exact(length)?,
            None => stream.read_to_end(),
        };
        Ok(Value::Bytes(bytes))
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        self.length
            .ok_or_else(|| Error::size("Bytes() has no fixed size"))
    }

    fn describe(&self) -> String {
        match self.length {
            Some(length) => format!("Bytes({length})"),
            None => "Bytes()".into(),
        }
    }
}

/// Two's complement integer of a fixed width and byte order.
#[derive(Debug, Clone, Copy)]
pub struct Integer {
    width: IntWidth,
    order: ByteOrder,
    signed: bool,
}

impl Integer {
    /// Integer of the given width, byte order and signedness.
    pub fn new(width: IntWidth, order: ByteOrder, signed: bool) -> Self {
        Self {
            width,
            order,
            signed,
        }
    }

    /// Unsigned single byte.
    pub fn u8() -> Self {
        Self::new(IntWidth::W1, ByteOrder::Big, false)
    }

    /// Unsigned 16-bit integer.
    pub fn u16(order: ByteOrder) -> Self {
        Self::new(IntWidth::W2, order, false)
    }

    /// Unsigned 32-bit integer.
    pub fn u32(order: ByteOrder) -> Self {
        Self::new(IntWidth::W4, order, false)
    }

    /// Unsigned 64-bit integer.
    pub fn u64(order: ByteOrder) -> Self {
        Self::new(IntWidth::W8, order, false)
    }

    /// Signed single byte.
    pub fn i8() -> Self {
        Self::new(IntWidth::W1, ByteOrder::Big, true)
    }

    /// Signed 16-bit integer.
    pub fn i16(order: ByteOrder) -> Self {
        Self::new(IntWidth::W2, order, true)
    }

    /// Signed 32-bit integer.
    pub fn i32(order: ByteOrder) -> Self {
        Self::new(IntWidth::W4, order, true)
    }

    /// Signed 64-bit integer.
    pub fn i64(order: ByteOrder) -> Self {
        Self::new(IntWidth::W8, order, true)
    }

    fn bounds(&self) -> (i128, i128) {
        let bits = self.width.bytes() as u32 * 8;
        if self.signed {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }
}

impl Construct for Integer {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        _context: &mut Context,
    ) -> Result<Option<Value>> {
        let number = value
            .as_int()
            .ok_or_else(|| Error::build(format!("expected an integer, got {}", value.kind())))?;
        let (lo, hi) = self.bounds();
        if number < lo || number > hi {
            return Err(Error::build(format!(
                "{} does not fit a {}-bit {} integer",
                number,
                self.width.bytes() * 8,
                if self.signed { "signed" } else { "unsigned" }
            )));
        }
        let wide = number.to_be_bytes();
        let mut bytes = wide[16 - self.width.bytes()..].to_vec();
        if self.order == ByteOrder::Little {
            bytes.reverse();
        }
        stream.write(&bytes);
        Ok(None)
    }

    fn parse_stream(&self, stream: &mut Stream, _context: &mut Context) -> Result<Value> {
        let mut bytes = stream.read_exact(self.width.bytes())?;
        if self.order == ByteOrder::Little {
            bytes.reverse();
        }
        let negative = self.signed && bytes[0] & 0x80 != 0;
        let mut number: i128 = if negative { -1 } else { 0 };
        for byte in bytes {
            number = (number << 8) | i128::from(byte);
        }
        Ok(Value::Int(number))
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Ok(self.width.bytes())
    }

    fn describe(&self) -> String {
        format!(
            "Integer({}, {}, {})",
            self.width.bytes(),
            self.order.name(),
            if self.signed { "signed" } else { "unsigned" }
        )
    }
}

/// IEEE 754 float of a fixed width and byte order.
#[derive(Debug, Clone, Copy)]
pub struct Float {
    width: FloatWidth,
    order: ByteOrder,
}

impl Float {
    /// Float of the given width and byte order.
    pub fn new(width: FloatWidth, order: ByteOrder) -> Self {
        Self { width, order }
    }
}

impl Construct for Float {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        _context: &mut Context,
    ) -> Result<Option<Value>> {
        let number = value
            .as_float()
            .ok_or_else(|| Error::build(format!("expected a float, got {}", value.kind())))?;
        let bytes = match (self.width, self.order) {
            (FloatWidth::W4, ByteOrder::Big) => (number as f32).to_be_bytes().to_vec(),
            (FloatWidth::W4, ByteOrder::Little) => (number as f32).to_le_bytes().to_vec(),
            (FloatWidth::W8, ByteOrder::Big) => number.to_be_bytes().to_vec(),
            (FloatWidth::W8, ByteOrder::Little) => number.to_le_bytes().to_vec(),
        };
        stream.write(&bytes);
        Ok(None)
    }

    fn parse_stream(&self, stream: &mut Stream, _context: &mut Context) -> Result<Value> {
        let bytes = stream.read_exact(self.width.bytes())?;
        let number = match (self.width, self.order) {
            (FloatWidth::W4, ByteOrder::Big) => {
                f64::from(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            (FloatWidth::W4, ByteOrder::Little) => {
                f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            (FloatWidth::W8, ByteOrder::Big) => f64::from_be_bytes(
                bytes
                    .try_into()
                    .map_err(|_| Error::parse("float byte width mismatch"))?,
            ),
            (FloatWidth::W8, ByteOrder::Little) => f64::from_le_bytes(
                bytes
                    .try_into()
                    .map_err(|_| Error::parse("float byte width mismatch"))?,
            ),
        };
        Ok(Value::Float(number))
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Ok(self.width.bytes())
    }

    fn describe(&self) -> String {
        format!("Float({}, {})", self.width.bytes(), self.order.name())
    }
}

/// Reports the current stream position in both directions; size zero.
///
/// Two of these around a field measure its extent; one plus a relative
/// offset yields an absolute pointer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Tell;

impl Construct for Tell {
    fn build_stream(
        &self,
        _value: &Value,
        stream: &mut Stream,
        _context: &mut Context,
    ) -> Result<Option<Value>> {
        Ok(Some(Value::Int(stream.tell() as i128)))
    }

    fn parse_stream(&self, stream: &mut Stream, _context: &mut Context) -> Result<Value> {
        Ok(Value::Int(stream.tell() as i128))
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Ok(0)
    }

    fn describe(&self) -> String {
        "Tell".into()
    }
}

enum ComputedSource {
    Fixed(Value),
    Func(Box<dyn Fn(&Context) -> Result<Value>>),
}

/// A field that occupies no bytes and takes its value from the context.
///
/// Parsing returns the computed value; building emits nothing and reports
/// the computed value through the context-value channel when the input is
/// null, so later fields can depend on it in both directions.
pub struct Computed {
    source: ComputedSource,
}

impl Computed {
    /// Compute the value from the context at build/parse time.
    pub fn new(func: impl Fn(&Context) -> Result<Value> + 'static) -> Self {
        Self {
            source: ComputedSource::Func(Box::new(func)),
        }
    }

    /// Always produce the same value.
    pub fn fixed(value: impl Into<Value>) -> Self {
        Self {
            source: ComputedSource::Fixed(value.into()),
        }
    }

    fn resolve(&self, context: &Context) -> Result<Value> {
        match &self.source {
            ComputedSource::Fixed(value) => Ok(value.clone()),
            ComputedSource::Func(func) => func(context),
        }
    }
}

impl Construct for Computed {
    fn build_stream(
        &self,
        value: &Value,
        _stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        if value.is_null() {
            Ok(Some(self.resolve(context)?))
        } else {
            Ok(Some(value.clone()))
        }
    }

    fn parse_stream(&self, _stream: &mut Stream, context: &mut Context) -> Result<Value> {
        self.resolve(context)
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Ok(0)
    }

    fn describe(&self) -> String {
        "Computed".into()
    }
}
