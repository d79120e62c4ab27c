//! Round-trip and size-honesty checks over randomized inputs.

use byteform::prelude::*;
use byteform::value_map;
use quickcheck_macros::quickcheck;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn assert_round_trip(construct: &dyn Construct, value: &Value) {
    let bytes = construct
        .build(value)
        .unwrap_or_else(|e| panic!("build failed for {}: {e}", construct.describe()));
    let parsed = construct
        .parse(&bytes)
        .unwrap_or_else(|e| panic!("parse failed for {}: {e}", construct.describe()));
    assert_eq!(&parsed, value, "round trip diverged for {}", construct.describe());
    if let Ok(size) = construct.fixed_size() {
        assert_eq!(
            bytes.len(),
            size,
            "size dishonest for {}",
            construct.describe()
        );
    }
}

#[test]
fn integers() {
    let rng = &mut StdRng::seed_from_u64(2322);
    let widths = [IntWidth::W1, IntWidth::W2, IntWidth::W4, IntWidth::W8];
    let orders = [ByteOrder::Big, ByteOrder::Little];
    for _ in 0..100 {
        for width in widths {
            for order in orders {
                let bits = width.bytes() as u32 * 8;
                let unsigned: u64 = rng.gen::<u64>() >> (64 - bits);
                assert_round_trip(
                    &Integer::new(width, order, false),
                    &Value::Int(unsigned as i128),
                );
                let signed = (rng.gen::<i64>() >> (64 - bits)) as i128;
                assert_round_trip(&Integer::new(width, order, true), &Value::Int(signed));
            }
        }
    }
}

#[test]
fn floats() {
    let rng = &mut StdRng::seed_from_u64(2322);
    for _ in 0..100 {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            // Values exact in binary32 so the narrow width round-trips too.
            let narrow = f64::from(rng.gen::<f32>());
            assert_round_trip(&Float::new(FloatWidth::W4, order), &Value::Float(narrow));
            assert_round_trip(
                &Float::new(FloatWidth::W8, order),
                &Value::Float(rng.gen::<f64>()),
            );
        }
    }
}

#[test]
fn byte_runs_and_flags() {
    let rng = &mut StdRng::seed_from_u64(2322);
    for _ in 0..50 {
        let len = rng.gen_range(0..64);
        let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        assert_round_trip(&Bytes::exact(len), &Value::Bytes(data.clone()));
        assert_round_trip(
            &Prefixed::new(Bytes::greedy(), Integer::u8()),
            &Value::Bytes(data),
        );
        assert_round_trip(&Flag, &Value::Bool(rng.gen()));
    }
}

#[test]
fn bit_fields() {
    let rng = &mut StdRng::seed_from_u64(2322);
    let fields = BitFields::new(&[("a", 3), ("b", 5), ("c", 11), ("d", 1)]);
    for _ in 0..100 {
        let value = Value::Map(value_map! {
            "a" => rng.gen_range(0..8u8),
            "b" => rng.gen_range(0..32u8),
            "c" => rng.gen_range(0..2048u16),
            "d" => rng.gen_range(0..2u8),
        });
        assert_round_trip(&fields, &value);
    }
}

#[test]
fn length_dependent_records() {
    let rng = &mut StdRng::seed_from_u64(2322);
    let frame = Record::new()
        .field("length", Integer::u8())
        .field(
            "payload",
            Contextual::new(|ctx| Ok(Bytes::exact(ctx.int("length")? as usize).boxed())),
        );
    for _ in 0..50 {
        let len = rng.gen_range(0..32u8);
        let payload: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        let value = Value::Map(value_map! { "length" => len, "payload" => payload });
        assert_round_trip(&frame, &value);
    }
}

#[test]
fn repeated_flags() {
    let rng = &mut StdRng::seed_from_u64(2322);
    for _ in 0..50 {
        let count = rng.gen_range(1..16);
        let items: Vec<Value> = (0..count).map(|_| Value::Bool(rng.gen())).collect();
        assert_round_trip(&RepeatExactly::new(Flag, count), &Value::Seq(items));
    }
}

#[quickcheck]
fn flag_round_trip(input: bool) -> bool {
    let bytes = Flag.build(&Value::Bool(input)).unwrap();
    Flag.parse(&bytes).unwrap() == Value::Bool(input)
}

#[quickcheck]
fn u32_round_trip(input: u32) -> bool {
    [ByteOrder::Big, ByteOrder::Little].iter().all(|order| {
        let c = Integer::u32(*order);
        let bytes = c.build(&Value::Int(input as i128)).unwrap();
        bytes.len() == 4 && c.parse(&bytes).unwrap() == Value::Int(input as i128)
    })
}

#[quickcheck]
fn i64_round_trip(input: i64) -> bool {
    let c = Integer::i64(ByteOrder::Little);
    let bytes = c.build(&Value::Int(input as i128)).unwrap();
    c.parse(&bytes).unwrap() == Value::Int(input as i128)
}

#[quickcheck]
fn prefixed_round_trip(data: Vec<u8>) -> bool {
    if data.len() > u8::MAX as usize {
        return true;
    }
    let c = Prefixed::new(Bytes::greedy(), Integer::u8());
    let bytes = c.build(&Value::Bytes(data.clone())).unwrap();
    c.parse(&bytes).unwrap() == Value::Bytes(data)
}

#[quickcheck]
fn cstring_round_trip(text: String) -> bool {
    if text.contains('\0') {
        return true;
    }
    let c = CString::new(Some(Encoding::Utf8));
    let bytes = c.build(&Value::from(text.clone())).unwrap();
    c.parse(&bytes).unwrap() == Value::Str(text)
}

#[quickcheck]
fn line_round_trip(data: Vec<u8>) -> bool {
    if data.windows(2).any(|w| w == b"\r\n") {
        return true;
    }
    let c = Line::raw();
    let bytes = c.build(&Value::Bytes(data.clone())).unwrap();
    c.parse(&bytes).unwrap() == Value::Bytes(data)
}
