//! Ordered named-field composition, the backbone of real formats.

use tracing::trace;

use crate::construct::Construct;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::stream::Stream;
use crate::value::{Map, Value};

/// A sequence of named constructs built and parsed in declaration order.
///
/// Declaration order *is* the wire order, and it is load-bearing: while a
/// record runs, every finished field's value is published into the current
/// context frame, so a later field may depend on an earlier one through
/// `Contextual`. Building additionally seeds the frame with the whole
/// input mapping, which lets a field look at a sibling's *target* value
/// before that sibling has been built.
///
/// An embedded record skips its own frame and mapping slot: its fields
/// read from and write into the enclosing record directly.
#[derive(Default)]
pub struct Record {
    fields: Vec<(String, Box<dyn Construct>)>,
    embedded: bool,
}

impl Record {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named field; wire order follows call order.
    pub fn field(mut self, name: impl Into<String>, construct: impl Construct + 'static) -> Self {
        self.fields.push((name.into(), construct.boxed()));
        self
    }

    /// Contribute the fields directly to the enclosing record.
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    fn build_fields(&self, input: &Map, stream: &mut Stream, context: &mut Context) -> Result<()> {
        for (name, field) in &self.fields {
            let sub = if field.is_embedded() {
                Value::Map(input.clone())
            } else {
                input.get(name).cloned().unwrap_or(Value::Null)
            };
            trace!(field = name.as_str(), "building record field");
            if let Some(context_value) = field.build_stream(&sub, stream, context)? {
                context.update(name.clone(), context_value);
            }
        }
        Ok(())
    }

    fn parse_fields(&self, stream: &mut Stream, context: &mut Context) -> Result<Map> {
        let mut out = Map::new();
        for (name, field) in &self.fields {
            trace!(field = name.as_str(), "parsing record field");
            let parsed = field.parse_stream(stream, context)?;
            if field.is_embedded() {
                let merged = parsed.as_map().ok_or_else(|| {
                    Error::parse(format!(
                        "embedded field '{}' must parse to a mapping, got {}",
                        name,
                        parsed.kind()
                    ))
                })?;
                for (key, value) in merged {
                    context.update(key.clone(), value.clone());
                    out.insert(key.clone(), value.clone());
                }
            } else {
                context.update(name.clone(), parsed.clone());
                out.insert(name.clone(), parsed);
            }
        }
        Ok(out)
    }
}

impl Construct for Record {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        context: &mut Context,
    ) -> Result<Option<Value>> {
        let input = value
            .as_map()
            .ok_or_else(|| Error::build(format!("expected a mapping, got {}", value.kind())))?;
        if !self.embedded {
            context.push_frame(input.clone());
        }
        let result = self.build_fields(input, stream, context);
        if !self.embedded {
            context.pop_frame();
        }
        result?;
        Ok(None)
    }

    fn parse_stream(&self, stream: &mut Stream, context: &mut Context) -> Result<Value> {
        if !self.embedded {
            context.push_frame(Map::new());
        }
        let result = self.parse_fields(stream, context);
        if !self.embedded {
            context.pop_frame();
        }
        Ok(Value::Map(result?))
    }

    fn size(&self, context: &Context) -> Result<usize> {
        self.fields
            .iter()
            .try_fold(0usize, |total, (_, field)| Ok(total + field.size(context)?))
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self.fields.iter().map(|(name, _)| name.as_str()).collect();
        format!("Record({})", names.join(", "))
    }

    fn is_embedded(&self) -> bool {
        self.embedded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::Adapted;
    use crate::bitfields::BitFields;
    use crate::contextual::Contextual;
    use crate::primitive::{Bytes, Computed, Integer, Tell};
    use crate::value_map;

    fn entry() -> Record {
        Record::new()
            .field("key", Integer::u8())
            .field("value", Bytes::exact(3))
    }

    #[test]
    fn fields_follow_declaration_order() {
        let input = Value::Map(value_map! { "key" => 1u8, "value" => &b"foo"[..] });
        assert_eq!(entry().build(&input).unwrap(), b"\x01foo");
        assert_eq!(
            entry().parse(b"\x10bar").unwrap(),
            Value::Map(value_map! { "key" => 16u8, "value" => &b"bar"[..] })
        );
        assert_eq!(entry().fixed_size().unwrap(), 4);
    }

    #[test]
    fn later_fields_depend_on_earlier_ones() {
        let entry = Record::new()
            .field("length", Integer::u8())
            .field(
                "data",
                Contextual::new(|ctx| Ok(Bytes::exact(ctx.int("length")? as usize).boxed())),
            );
        assert_eq!(
            entry
                .build(&Value::Map(
                    value_map! { "length" => 3u8, "data" => &b"foo"[..] }
                ))
                .unwrap(),
            b"\x03foo"
        );
        assert_eq!(
            entry.parse(b"\x02barbaz").unwrap(),
            Value::Map(value_map! { "length" => 2u8, "data" => &b"ba"[..] })
        );
        let ctx = Context::from(value_map! { "length" => 10u8 });
        assert_eq!(entry.size(&ctx).unwrap(), 11);
    }

    #[test]
    fn nested_records_scope_their_context() {
        let message = Record::new()
            .field("header", Record::new().field("payload_size", Integer::u8()))
            .field(
                "payload",
                Contextual::new(|ctx| {
                    let size = ctx
                        .map("header")?
                        .get("payload_size")
                        .and_then(Value::as_int)
                        .ok_or_else(|| Error::contextual("missing payload_size"))?;
                    Ok(Bytes::exact(size as usize).boxed())
                }),
            );
        let data = Value::Map(value_map! {
            "header" => value_map! { "payload_size" => 3u8 },
            "payload" => &b"foo"[..],
        });
        let built = message.build(&data).unwrap();
        assert_eq!(built, b"\x03foo");
        assert_eq!(message.parse(&built).unwrap(), data);
    }

    #[test]
    fn embedded_records_share_the_outer_frame() {
        let message = Record::new()
            .field(
                "header",
                Record::new().field("payload_size", Integer::u8()).embedded(),
            )
            .field(
                "payload",
                Contextual::new(|ctx| Ok(Bytes::exact(ctx.int("payload_size")? as usize).boxed())),
            );
        let data = Value::Map(value_map! { "payload_size" => 3u8, "payload" => &b"foo"[..] });
        let built = message.build(&data).unwrap();
        assert_eq!(built, b"\x03foo");
        assert_eq!(message.parse(&built).unwrap(), data);
    }

    #[test]
    fn embedding_survives_adaption() {
        fn triple(value: Value) -> Result<Value> {
            let mut map = value.as_map().cloned().unwrap_or_default();
            if let Some(size) = map.get("payload_size").and_then(Value::as_int) {
                map.insert("payload_size".into(), Value::Int(size * 3));
            }
            Ok(Value::Map(map))
        }
        let message = Record::new()
            .field(
                "header",
                Adapted::new(Record::new().field("payload_size", Integer::u8()).embedded())
                    .before_build(triple)
                    .after_parse(triple),
            )
            .field(
                "payload",
                Contextual::new(|ctx| Ok(Bytes::exact(ctx.int("payload_size")? as usize).boxed())),
            );
        assert_eq!(
            message
                .build(&Value::Map(
                    value_map! { "payload_size" => 1u8, "payload" => &b"foo"[..] }
                ))
                .unwrap(),
            b"\x03foo"
        );
        assert_eq!(
            message.parse(b"\x01bar").unwrap(),
            Value::Map(value_map! { "payload_size" => 3u8, "payload" => &b"bar"[..] })
        );
    }

    #[test]
    fn embedded_bitfields_feed_the_record_context() {
        let entry = Record::new()
            .field(
                "header",
                BitFields::new(&[("foo", 2), ("bar", 2), ("length", 4)]).embedded(),
            )
            .field(
                "payload",
                Contextual::new(|ctx| Ok(Bytes::exact(ctx.int("length")? as usize).boxed())),
            );
        assert_eq!(
            entry
                .build(&Value::Map(value_map! {
                    "foo" => 2u8, "bar" => 0u8, "length" => 3u8, "payload" => &b"baz"[..]
                }))
                .unwrap(),
            b"\x83baz"
        );
        assert_eq!(
            entry.parse(b"\x33xxx").unwrap(),
            Value::Map(value_map! {
                "foo" => 0u8, "bar" => 3u8, "length" => 3u8, "payload" => &b"xxx"[..]
            })
        );
    }

    #[test]
    fn computed_fields_join_the_context() {
        let example = Record::new()
            .field("x", Integer::u8())
            .field("y", Integer::u8())
            .field(
                "x_plus_y",
                Computed::new(|ctx| Ok(Value::Int(ctx.int("x")? + ctx.int("y")?))),
            )
            .field(
                "z",
                Contextual::new(|ctx| Ok(Bytes::exact(ctx.int("x_plus_y")? as usize).boxed())),
            );
        assert_eq!(
            example.parse(b"\x01\x02foo").unwrap(),
            Value::Map(value_map! {
                "x" => 1u8, "y" => 2u8, "x_plus_y" => 3u8, "z" => &b"foo"[..]
            })
        );
    }

    #[test]
    fn tell_fields_record_positions() {
        let example = Record::new()
            .field("key", Bytes::exact(3))
            .field("pos1", Tell)
            .field("value", Bytes::exact(3))
            .field("pos2", Tell);
        assert_eq!(
            example.parse(b"foobar").unwrap(),
            Value::Map(value_map! {
                "key" => &b"foo"[..], "pos1" => 3u8, "value" => &b"bar"[..], "pos2" => 6u8
            })
        );
    }

    #[test]
    fn build_rejects_non_mappings() {
        assert!(matches!(
            entry().build(&Value::Int(1)).unwrap_err(),
            Error::Build(_)
        ));
    }

    #[test]
    fn failed_field_reports_its_error() {
        let err = entry().parse(b"\x01fo").unwrap_err();
        assert_eq!(
            err,
            Error::parse("could not read enough bytes, expected 3, found 2")
        );
    }
}
