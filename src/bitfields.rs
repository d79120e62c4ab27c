//! Named bit-wise fields packed big-endian from the most significant bit.

use itertools::Itertools;

use crate::construct::Construct;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::stream::Stream;
use crate::value::{Map, Value};

/// An ordered run of named unsigned bit fields.
///
/// The stream stays byte-aligned: the packed bits are right-padded with
/// zeroes to a whole number of bytes on build, and trailing bits without a
/// declaration are ignored on parse. Fields omitted from the build input
/// default to zero, which is how reserved bits are usually expressed.
pub struct BitFields {
    fields: Vec<(String, usize)>,
    width: usize,
    embedded: bool,
}

impl BitFields {
    /// Declare the fields in wire order as `(name, bits)` pairs.
    pub fn new(fields: &[(&str, usize)]) -> Self {
        let total: usize = fields.iter().map(|(_, bits)| bits).sum();
        Self {
            fields: fields
                .iter()
                .map(|(name, bits)| ((*name).to_owned(), *bits))
                .collect(),
            width: (total + 7) / 8,
            embedded: false,
        }
    }

    /// Contribute the fields directly to the enclosing record.
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    fn pack(&self, map: &Map) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.width];
        let mut cursor = 0usize;
        for (name, bits) in &self.fields {
            let value = match map.get(name) {
                Some(value) => value.as_int().ok_or_else(|| {
                    Error::build(format!(
                        "bit field '{}' must be an integer, got {}",
                        name,
                        value.kind()
                    ))
                })?,
                None => 0,
            };
            let fits = value >= 0 && (*bits >= 127 || value < (1i128 << bits));
            if !fits {
                return Err(Error::build(format!(
                    "cannot pack {} into {} bit{}",
                    value,
                    bits,
                    if *bits > 1 { "s" } else { "" }
                )));
            }
            for shift in (0..*bits).rev() {
                if (value >> shift) & 1 == 1 {
                    out[cursor / 8] |= 1 << (7 - cursor % 8);
                }
                cursor += 1;
            }
        }
        Ok(out)
    }

    fn unpack(&self, data: &[u8]) -> Map {
        let mut out = Map::new();
        let mut cursor = 0usize;
        for (name, bits) in &self.fields {
            let mut value: i128 = 0;
            for _ in 0..*bits {
                let bit = (data[cursor / 8] >> (7 - cursor % 8)) & 1;
                value = (value << 1) | i128::from(bit);
                cursor += 1;
            }
            out.insert(name.clone(), Value::Int(value));
        }
        out
    }
}

impl Construct for BitFields {
    fn build_stream(
        &self,
        value: &Value,
        stream: &mut Stream,
        _context: &mut Context,
    ) -> Result<Option<Value>> {
        let map = value
            .as_map()
            .ok_or_else(|| Error::build(format!("expected a mapping, got {}", value.kind())))?;
        stream.write(&self.pack(map)?);
        Ok(None)
    }

    fn parse_stream(&self, stream: &mut Stream, _context: &mut Context) -> Result<Value> {
        let data = stream.read_exact(self.width)?;
        Ok(Value::Map(self.unpack(&data)))
    }

    fn size(&self, _context: &Context) -> Result<usize> {
        Ok(self.width)
    }

    fn describe(&self) -> String {
        format!(
            "BitFields({})",
            self.fields
                .iter()
                .map(|(name, bits)| format!("{name}:{bits}"))
                .join(", ")
        )
    }

    fn is_embedded(&self) -> bool {
        self.embedded
    }
}
