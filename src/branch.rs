//! Conditional constructs: constants, predicates, dispatch tables, enums.

use itertools::Itertools;
use tracing::trace;

use crate::construct::Construct;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::primitive::{Bytes, Pass};
use crate::stream::Stream;
use crate::value::Value;

type PredicateFn = Box<dyn Fn(&Context) -> Result<bool>>;
type KeyFn = Box<dyn Fn(&Context) -> Result<Value>>;

/// Fails every operation with a fixed message.
///
/// Useful as the default branch of `Switch` and `Enum`.
pub struct Raise {
    message: String,
}

impl Raise {
    /// Fail with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Construct for Raise {
    fn build_stream(
        &self,
        _value: &Value,
        _stream: &mut Stream,
        _context: &mut Context,
    ) -> Result<Option<Value>> {
        Err(Error::build(&self.message))
    }

    fn parse_stream(&self, _stream: &mut Stream, _context: &mut Context) -> Result<Value> {
        Err(Error::parse(&self.message))
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Err(Error::size(&self.message))
    }

    fn describe(&self) -> String {
        format!("Raise({})", self.message)
    }
}

/// A constant value built and parsed through the wrapped construct.
///
/// Building accepts null (the constant is substituted) or the exact
/// constant; parsing asserts equality with the constant.
pub struct Const {
    inner: Box<dyn Construct>,
    value: Value,
}

impl Const {
    /// Constant `value` carried by `inner`.
    pub fn new(inner: impl Construct + 'static, value: impl Into<Value>) -> Self {
        Self {
            inner: inner.boxed(),
            value: value.into(),
        }
    }

    /// Shorthand for a fixed byte signature: `Const::bytes(b"SIG")` is a
    /// byte run of the signature's length holding the signature.
    pub fn bytes(signature: &[u8]) -> Self {
        Self::new(Bytes::exact(signature.len()), signature)
    }
}

impl Construct for Const {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        if !value.is_null() && *value != self.value {
            return Err(Error::build(format!(
                "provided value must be null or {:?}, got {:?}",
                self.value, value
            )));
        }
        self.inner.build_stream(&self.value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let parsed = self.inner.parse_stream(stream, context)?;
        if parsed != self.value {
            return Err(Error::parse(format!(
                "parsed value must be {:?}, got {:?}",
                self.value, parsed
            )));
        }
        Ok(parsed)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.inner.size(context)
    }

    fn describe(&self) -> String {
        format!("Const({})", self.inner.describe())
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}

/// Chooses between two constructs by a context predicate.
pub struct If {
    predicate: PredicateFn,
    then_branch: Box<dyn Construct>,
    else_branch: Box<dyn Construct>,
}

impl If {
    /// Use `then_branch` when `predicate` holds, `Pass` otherwise.
    pub fn new(
        predicate: impl Fn(&Context) -> Result<bool> + 'static,
        then_branch: impl Construct + 'static,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            then_branch: then_branch.boxed(),
            else_branch: Pass.boxed(),
        }
    }

    /// Replace the negative branch.
    pub fn or_else(mut self, else_branch: impl Construct + 'static) -> Self {
        self.else_branch = else_branch.boxed();
        self
    }

    fn choose(&self, context: &Context) -> Result<&dyn Construct> {
        if (self.predicate)(context)? {
            Ok(self.then_branch.as_ref())
        } else {
            Ok(self.else_branch.as_ref())
        }
    }
}

impl Construct for If {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        self.choose(context)?.build_stream(value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        self.choose(context)?.parse_stream(stream, context)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.choose(context)?.size(context)
    }

    fn describe(&self) -> String {
        format!(
            "If({}, {})",
            self.then_branch.describe(),
            self.else_branch.describe()
        )
    }
}

/// Dispatches to one of several constructs by a context-derived key.
pub struct Switch {
    key: KeyFn,
    cases: Vec<(Value, Box<dyn Construct>)>,
    default: Box<dyn Construct>,
}

impl Switch {
    /// Dispatch on `key`; without a matching case the default branch
    /// fails.
    pub fn new(key: impl Fn(&Context) -> Result<Value> + 'static) -> Self {
        Self {
            key: Box::new(key),
            cases: Vec::new(),
            default: Raise::new("no default case specified").boxed(),
        }
    }

    /// Add a case.
    pub fn case(mut self, key: impl Into<Value>, construct: impl Construct + 'static) -> Self {
        self.cases.push((key.into(), construct.boxed()));
        self
    }

    /// Replace the default branch.
    pub fn default(mut self, construct: impl Construct + 'static) -> Self {
        self.default = construct.boxed();
        self
    }

    fn choose(&self, context: &Context) -> Result<&dyn Construct> {
        let key = (self.key)(context)?;
        Ok(self
            .cases
            .iter()
            .find(|(case, _)| *case == key)
            .map(|(_, construct)| construct.as_ref())
            .unwrap_or(self.default.as_ref()))
    }
}

impl Construct for Switch {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        self.choose(context)?.build_stream(value, stream, context)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        self.choose(context)?.parse_stream(stream, context)
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.choose(context)?.size(context)
    }

    fn describe(&self) -> String {
        format!(
            "Switch(cases=[{}])",
            self.cases.iter().map(|(key, _)| format!("{key:?}")).join(", ")
        )
    }
}

/// Bidirectional name↔value mapping over the wrapped construct.
///
/// Building accepts a case name or a case value and writes the value; the
/// context value recorded under the field name is always the *name*.
/// Parsing reads a value and maps it back to its name. Unknown names or
/// values fall through to the default branch, with the stream rolled back
/// to where the attempt started.
pub struct Enum {
    inner: Box<dyn Construct>,
    cases: Vec<(String, Value)>,
    default: Box<dyn Construct>,
}

impl Enum {
    /// Enum over `inner` with no cases yet.
    pub fn new(inner: impl Construct + 'static) -> Self {
        Self {
            inner: inner.boxed(),
            cases: Vec::new(),
            default: Raise::new("no default case specified").boxed(),
        }
    }

    /// Add a named case. Values must stay distinct, otherwise the
    /// value→name direction would be ambiguous.
    pub fn case(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        assert!(
            self.cases.iter().all(|(n, _)| *n != name),
            "duplicate enum case name '{name}'"
        );
        assert!(
            self.cases.iter().all(|(_, v)| *v != value),
            "duplicate enum case value for '{name}'"
        );
        self.cases.push((name, value));
        self
    }

    /// Replace the default branch.
    pub fn default(mut self, construct: impl Construct + 'static) -> Self {
        self.default = construct.boxed();
        self
    }

    fn name_for(&self, value: &Value) -> Option<&str> {
        self.cases
            .iter()
            .find(|(_, v)| v == value)
            .map(|(n, _)| n.as_str())
    }

    fn value_for(&self, value: &Value) -> Option<&Value> {
        if let Some(name) = value.as_str() {
            if let Some((_, v)) = self.cases.iter().find(|(n, _)| n == name) {
                return Some(v);
            }
        }
        self.cases.iter().map(|(_, v)| v).find(|v| *v == value)
    }
}

impl Construct for Enum {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        let case_value = match self.value_for(value) {
            Some(case_value) => case_value.clone(),
            None => return self.default.build_stream(value, stream, context),
        };
        let fallback = stream.tell();
        match self.inner.build_stream(&case_value, stream, context) {
            Ok(_) => {}
            Err(Error::Build(_)) => {
                trace!("enum case failed to build, delegating to the default branch");
                stream.seek(fallback);
                self.default.build_stream(&case_value, stream, context)?;
            }
            Err(other) => return Err(other),
        }
        // The context always receives the name, never the raw value.
        let name = self
            .name_for(&case_value)
            .ok_or_else(|| Error::build("enum case disappeared"))?;
        Ok(Some(Value::from(name)))
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        let fallback = stream.tell();
        let parsed = match self.inner.parse_stream(stream, context) {
            Ok(parsed) => parsed,
            Err(Error::Parse(_)) => {
                trace!("enum value failed to parse, delegating to the default branch");
                stream.seek(fallback);
                return self.default.parse_stream(stream, context);
            }
            Err(other) => return Err(other),
        };
        match self.name_for(&parsed) {
            Some(name) => Ok(Value::from(name)),
            None => {
                stream.seek(fallback);
                self.default.parse_stream(stream, context)
            }
        }
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.inner.size(context)
    }

    fn describe(&self) -> String {
        format!(
            "Enum({}, cases=[{}])",
            self.inner.describe(),
            self.cases.iter().map(|(name, _)| name.as_str()).join(", ")
        )
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{Flag, Integer};
    use crate::value_map;

    #[test]
    fn raise_fails_everything() {
        let r = Raise::new("a condition is false");
        assert_eq!(
            r.build(&Value::Null).unwrap_err(),
            Error::build("a condition is false")
        );
        assert_eq!(
            r.parse(b"anything").unwrap_err(),
            Error::parse("a condition is false")
        );
        assert_eq!(
            r.fixed_size().unwrap_err(),
            Error::size("a condition is false")
        );
    }

    #[test]
    fn const_substitutes_null() {
        let c = Const::new(Flag, true);
        assert_eq!(c.build(&Value::Bool(true)).unwrap(), b"\x01");
        assert_eq!(c.build(&Value::Null).unwrap(), b"\x01");
        assert!(matches!(
            c.build(&Value::Bool(false)).unwrap_err(),
            Error::Build(_)
        ));
        assert_eq!(c.parse(b"\x01").unwrap(), Value::Bool(true));
        assert!(matches!(c.parse(b"\x00").unwrap_err(), Error::Parse(_)));
    }

    #[test]
    fn const_bytes_shorthand() {
        let c = Const::bytes(b"SIGNATURE");
        assert_eq!(c.build(&Value::Null).unwrap(), b"SIGNATURE");
        assert_eq!(c.parse(b"SIGNATURE").unwrap(), Value::from(&b"SIGNATURE"[..]));
        assert_eq!(c.fixed_size().unwrap(), 9);
        assert!(matches!(c.parse(b"SIGNATURX").unwrap_err(), Error::Parse(_)));
    }

    #[test]
    fn if_chooses_by_predicate() {
        let i = If::new(
            |ctx| Ok(ctx.require("flag")?.as_bool().unwrap_or(false)),
            Const::bytes(b"True"),
        )
        .or_else(Const::bytes(b"False"));
        let mut ctx = Context::from(value_map! { "flag" => true });
        assert_eq!(i.build_with(&Value::Null, &mut ctx).unwrap(), b"True");
        assert_eq!(i.size(&ctx).unwrap(), 4);
        let mut ctx = Context::from(value_map! { "flag" => false });
        assert_eq!(i.build_with(&Value::Null, &mut ctx).unwrap(), b"False");
        assert_eq!(i.size(&ctx).unwrap(), 5);
    }

    #[test]
    fn if_defaults_to_pass() {
        let i = If::new(
            |ctx| Ok(ctx.require("flag")?.as_bool().unwrap_or(false)),
            Const::bytes(b"True"),
        );
        let ctx = Context::from(value_map! { "flag" => false });
        assert_eq!(i.size(&ctx).unwrap(), 0);
    }

    #[test]
    fn switch_dispatches_and_rejects_unknown_keys() {
        let s = Switch::new(|ctx| Ok(ctx.require("foo")?.clone()))
            .case(1u8, Integer::u8())
            .case(2u8, crate::primitive::Bytes::exact(3));
        let mut ctx = Context::from(value_map! { "foo" => 1u8 });
        assert_eq!(s.build_with(&Value::Int(5), &mut ctx).unwrap(), b"\x05");
        let mut ctx = Context::from(value_map! { "foo" => 2u8 });
        assert_eq!(
            s.parse_with(b"baz", &mut ctx).unwrap(),
            Value::from(&b"baz"[..])
        );
        assert_eq!(s.size(&ctx).unwrap(), 3);
        let mut ctx = Context::from(value_map! { "foo" => 3u8 });
        assert_eq!(
            s.build_with(&Value::from(&b"baz"[..]), &mut ctx).unwrap_err(),
            Error::build("no default case specified")
        );
        assert_eq!(
            s.parse_with(b"baz", &mut ctx).unwrap_err(),
            Error::parse("no default case specified")
        );
    }

    #[test]
    fn switch_default_branch() {
        let s = Switch::new(|_| Ok(Value::Null)).default(Pass);
        assert_eq!(s.build(&Value::Null).unwrap(), b"");
        assert_eq!(s.parse(b"").unwrap(), Value::Null);
    }

    #[test]
    fn enum_maps_names_and_values() {
        let e = Enum::new(Flag).case("yes", true).case("no", false);
        assert_eq!(e.build(&Value::from("yes")).unwrap(), b"\x01");
        // A raw case value is accepted too.
        assert_eq!(e.build(&Value::Bool(false)).unwrap(), b"\x00");
        assert_eq!(e.parse(b"\x00").unwrap(), Value::from("no"));
        assert_eq!(e.fixed_size().unwrap(), 1);
    }

    #[test]
    fn enum_unknown_cases_hit_the_default() {
        let e = Enum::new(crate::primitive::Bytes::exact(3))
            .case("x", &b"xxx"[..])
            .case("y", &b"yyy"[..]);
        assert_eq!(
            e.build(&Value::from("z")).unwrap_err(),
            Error::build("no default case specified")
        );
        assert_eq!(
            e.parse(b"zzz").unwrap_err(),
            Error::parse("no default case specified")
        );

        let e = Enum::new(crate::primitive::Bytes::exact(3))
            .case("x", &b"xxx"[..])
            .default(Pass);
        assert_eq!(e.build(&Value::from("z")).unwrap(), b"");
        assert_eq!(e.parse(b"z").unwrap(), Value::Null);
    }

    #[test]
    fn enum_restores_the_stream_before_the_default() {
        let e = Enum::new(crate::primitive::Bytes::exact(3))
            .case("x", &b"xxx"[..])
            .default(crate::primitive::Bytes::greedy());
        // "zzz" parses fine through the inner construct but is no known
        // case, so the default re-reads from the original position.
        assert_eq!(e.parse(b"zzz").unwrap(), Value::from(&b"zzz"[..]));
    }

    #[test]
    #[should_panic(expected = "duplicate enum case value")]
    fn enum_rejects_ambiguous_values() {
        let _ = Enum::new(Flag).case("yes", true).case("also_yes", true);
    }

    #[test]
    fn enum_records_the_name_in_the_context() {
        // Even when the raw case value is supplied, later fields see the
        // case name.
        let entry = crate::record::Record::new()
            .field("answer", Enum::new(Flag).case("yes", true).case("no", false))
            .field(
                "echo",
                crate::contextual::Contextual::new(|ctx| {
                    Ok(Const::bytes(ctx.text("answer")?.as_bytes()).boxed())
                }),
            );
        assert_eq!(
            entry
                .build(&Value::Map(value_map! { "answer" => true }))
                .unwrap(),
            b"\x01yes"
        );
        assert_eq!(
            entry.parse(b"\x00no").unwrap(),
            Value::Map(value_map! { "answer" => "no", "echo" => &b"no"[..] })
        );
    }
}
