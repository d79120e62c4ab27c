//! Late-bound constructs whose parameters come from the context.

use crate::construct::Construct;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::stream::Stream;
use crate::value::Value;

type FactoryFn = Box<dyn Fn(&Context) -> Result<Box<dyn Construct>>>;

/// A construct factory invoked at build/parse/size time.
///
/// The factory reads the current context and returns the construct to
/// delegate to, which is how a field's shape can depend on an earlier
/// field's value. Factories must be pure: everything they need has to be
/// reachable through a context read. Any error the factory reports
/// surfaces as [`Error::Contextual`].
pub struct Contextual {
    factory: FactoryFn,
}

impl Contextual {
    /// Build the delegate from the context on every operation.
    pub fn new(factory: impl Fn(&Context) -> Result<Box<dyn Construct>> + 'static) -> Self {
        Self {
            factory: Box::new(factory),
        }
    }

    fn resolve(&self, context: &Context) -> Result<Box<dyn Construct>> {
        (self.factory)(context).map_err(|e| match e {
            Error::Contextual(_) => e,
            other => Error::contextual(other.to_string()),
        })
    }
}

impl Construct for Contextual {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        let construct = self.resolve(context)?;
        construct.build_stream(value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let construct = self.resolve(context)?;
        construct.parse_stream(stream, context)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.resolve(context)?.size(context)
    }

    fn describe(&self) -> String {
        "Contextual".into()
    }
}
