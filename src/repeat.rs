//! Repetition combinators over half-open cardinality ranges.

use crate::construct::Construct;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::stream::Stream;
use crate::value::Value;

type UntilFn = Box<dyn Fn(&[Value]) -> bool>;

/// Repeats a construct between `start` (inclusive) and `stop` (exclusive)
/// times.
///
/// Building accepts a sequence whose length lies in `[start, stop)`, or a
/// byte run treated as a sequence of integer items (single-byte runs build
/// from those directly). An optional `until` predicate over the items so
/// far stops the repetition early in both directions; the item that
/// triggered the stop is kept.
///
/// Parsing salvages a partial result: when an element fails to parse after
/// at least `start` items were read, the items read so far are returned.
///
/// `stop == start` names an empty range; it stays constructible, but no
/// sequence length can ever satisfy the build bound check.
pub struct Repeat {
    inner: Box<dyn Construct>,
    start: usize,
    stop: usize,
    until: Option<UntilFn>,
}

impl Repeat {
    /// Repeat `inner` between `start` and `stop` (exclusive) times.
    pub fn new(inner: impl Construct + 'static, start: usize, stop: usize) -> Self {
        assert!(stop >= start, "stop must be >= start");
        Self {
            inner: inner.boxed(),
            start,
            stop,
            until: None,
        }
    }

    /// Stop repeating once `predicate` holds for the accumulated items.
    pub fn until(mut self, predicate: impl Fn(&[Value]) -> bool + 'static) -> Self {
        self.until = Some(Box::new(predicate));
        self
    }

    fn items_from(&self, value: &Value) -> Result<Vec<Value>> {
        match value {
            Value::Seq(items) => Ok(items.clone()),
            // Iterating a byte run yields its bytes as integers.
            Value::Bytes(bytes) => Ok(bytes.iter().map(|b| Value::Int(i128::from(*b))).collect()),
            other => Err(Error::build(format!(
                "expected a sequence, got {}",
                other.kind()
            ))),
        }
    }
}

impl Construct for Repeat {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        let items = self.items_from(value)?;
        if items.len() < self.start || items.len() >= self.stop {
            return Err(Error::build(format!(
                "length of the object to build must be in range [{}, {}), got {}",
                self.start,
                self.stop,
                items.len()
            )));
        }
        let mut written = Vec::with_capacity(items.len());
        for item in items {
            self.inner.build_stream(&item, stream, context)?;
            written.push(item);
            if let Some(predicate) = &self.until {
                if predicate(&written) {
                    break;
                }
            }
        }
        Ok(None)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let cap = self.stop.saturating_sub(1);
        let mut items = Vec::new();
        while items.len() < cap {
            match self.inner.parse_stream(stream, context) {
                Ok(item) => {
                    items.push(item);
                    if let Some(predicate) = &self.until {
                        if predicate(&items) {
                            break;
                        }
                    }
                }
                Err(Error::Parse(cause)) => {
                    if items.len() < self.start {
                        return Err(Error::parse(format!(
                            "required to parse at least {} of {}, parsed {} instead; \
                             error was: {}",
                            self.start,
                            self.inner.describe(),
                            items.len(),
                            cause
                        )));
                    }
                    return Ok(Value::Seq(items));
                }
                Err(other) => return Err(other),
            }
        }
        if items.len() < self.start {
            return Err(Error::parse(format!(
                "required to parse at least {} of {}, parsed {} instead; \
                 exited due to 'until' predicate",
                self.start,
                self.inner.describe(),
                items.len()
            )));
        }
        Ok(Value::Seq(items))
    }

    fn size(&self, context: &Context) -> Result<usize> {
        if self.until.is_some() || self.stop == 0 || self.start != self.stop - 1 {
            return Err(Error::size("cannot determine size of variable sized Repeat"));
        }
        Ok(self.start * self.inner.size(context)?)
    }

    fn describe(&self) -> String {
        format!(
            "Repeat({}, start={}, stop={})",
            self.inner.describe(),
            self.start,
            self.stop
        )
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}

/// Repeats a construct exactly `n` times; fixed size `n` times the inner
/// size.
pub struct RepeatExactly {
    inner: Repeat,
    count: usize,
}

impl RepeatExactly {
    /// Repeat `inner` exactly `count` times.
    pub fn new(inner: impl Construct + 'static, count: usize) -> Self {
        Self {
            inner: Repeat::new(inner, count, count + 1),
            count,
        }
    }

    /// Stop repeating once `predicate` holds for the accumulated items.
    pub fn until(mut self, predicate: impl Fn(&[Value]) -> bool + 'static) -> Self {
        self.inner = self.inner.until(predicate);
        self
    }
}

impl Construct for RepeatExactly {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        self.inner.build_stream(value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        self.inner.parse_stream(stream, context)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.inner.size(context)
    }

    fn describe(&self) -> String {
        format!("RepeatExactly({}, {})", self.inner.inner.describe(), self.count)
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}
