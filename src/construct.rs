//! The construct contract: one description, three operations.

use crate::context::Context;
use crate::error::Result;
use crate::repeat::{Repeat, RepeatExactly};
use crate::stream::Stream;
use crate::value::Value;

/// A node of a format description tree.
///
/// Every node supports the same three operations: building a value into
/// bytes, parsing a value out of bytes, and reporting its on-wire size when
/// that size is determinate. Wrapping nodes delegate to the node they wrap
/// and add a transformation on top.
///
/// Trees are immutable once assembled; a single tree may serve any number
/// of calls as long as each call brings its own stream and context.
pub trait Construct {
    /// Write `value` to the stream.
    ///
    /// A `Some` return is the *context value*: the value the enclosing
    /// record must put in its context frame under this field's name instead
    /// of the build input. `Enum` reports the case name here, `Checksum`
    /// the computed digest, `Tell` the stream position.
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>>;

    /// Decode one value from the stream.
    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value>;

    /// Number of bytes this construct occupies under `context`, or an
    /// [`Error::Size`](crate::error::Error::Size) when not determinate.
    fn size(&self, context: &Context) -> Result<usize>;

    /// Short human-readable description, used in error messages.
    fn describe(&self) -> String;

    /// Whether this construct contributes its fields directly to the
    /// enclosing record instead of occupying a single named slot. Wrappers
    /// forward the wrapped construct's flag, so embedding survives
    /// adaption.
    fn is_embedded(&self) -> bool {
        false
    }

    /// Build `value` into a byte vector under a fresh context.
    fn build(&self, value: &Value) -> Result<Vec<u8>> {
        let mut context = Context::new();
        self.build_with(value, &mut context)
    }

    /// Build `value` into a byte vector under a caller-supplied context.
    fn build_with(&self, value: &Value, context: &mut Context) -> Result<Vec<u8>> {
        let mut stream = Stream::new();
        self.build_stream(value, &mut stream, context)?;
        Ok(stream.into_bytes())
    }

    /// Parse a value out of `data` under a fresh context.
    fn parse(&self, data: &[u8]) -> Result<Value> {
        let mut context = Context::new();
        self.parse_with(data, &mut context)
    }

    /// Parse a value out of `data` under a caller-supplied context.
    fn parse_with(&self, data: &[u8], context: &mut Context) -> Result<Value> {
        let mut stream = Stream::from(data);
        self.parse_stream(&mut stream, context)
    }

    /// Size under an empty context.
    fn fixed_size(&self) -> Result<usize> {
        self.size(&Context::new())
    }

    /// Box the construct for storage in heterogeneous trees.
    fn boxed(self) -> Box<dyn Construct>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }

    /// Repeat this construct between `start` (inclusive) and `stop`
    /// (exclusive) times.
    fn repeated(self, start: usize, stop: usize) -> Repeat
    where
        Self: Sized + 'static,
    {
        Repeat::new(self, start, stop)
    }

    /// Repeat this construct exactly `n` times.
    fn times(self, n: usize) -> RepeatExactly
    where
        Self: Sized + 'static,
    {
        RepeatExactly::new(self, n)
    }
}

impl Construct for Box<dyn Construct> {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        (**self).build_stream(value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        (**self).parse_stream(stream, context)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        (**self).size(context)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn is_embedded(&self) -> bool {
        (**self).is_embedded()
    }
}
