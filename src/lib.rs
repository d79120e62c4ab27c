//! Declarative binary format descriptions.
//!
//! A format is described once, as a tree of immutable *constructs*, and
//! that single description drives three operations: building a value into
//! bytes, parsing bytes back into a value, and reporting the on-wire size
//! when it is determinate.
//!
//! Primitives (integers, floats, byte runs, bit fields, constants) are
//! composed with combinators (records, conditionals, repeats, length
//! prefixes, padding, checksums) into descriptions of message framings,
//! storage layouts, or wire protocols. Cross-field dependencies — a length
//! field sizing a later payload, a type tag selecting a payload shape —
//! are expressed through a layered [`context`](context::Context) that every
//! operation threads through the tree.
//!
//! ```
//! use byteform::prelude::*;
//! use byteform::value_map;
//!
//! let frame = Record::new()
//!     .field("length", Integer::u8())
//!     .field(
//!         "payload",
//!         Contextual::new(|ctx| Ok(Bytes::exact(ctx.int("length")? as usize).boxed())),
//!     );
//!
//! let bytes = frame
//!     .build(&Value::Map(value_map! { "length" => 3u8, "payload" => &b"abc"[..] }))
//!     .unwrap();
//! assert_eq!(bytes, b"\x03abc");
//! assert_eq!(
//!     frame.parse(&bytes).unwrap(),
//!     Value::Map(value_map! { "length" => 3u8, "payload" => &b"abc"[..] })
//! );
//! ```

pub mod adapt;
pub mod bitfields;
pub mod branch;
pub mod construct;
pub mod context;
pub mod contextual;
pub mod error;
pub mod primitive;
pub mod record;
pub mod repeat;
pub mod stream;
pub mod text;
pub mod value;

pub mod prelude {
    //! Single import for the whole construct vocabulary.

    pub use crate::adapt::{Adapted, Aligned, Checksum, Direction, Offset, Padded, Padding, Prefixed};
    pub use crate::bitfields::BitFields;
    pub use crate::branch::{Const, Enum, If, Raise, Switch};
    pub use crate::construct::Construct;
    pub use crate::context::Context;
    pub use crate::contextual::Contextual;
    pub use crate::error::{Error, Result};
    pub use crate::primitive::{
        ByteOrder, Bytes, Computed, Flag, Float, FloatWidth, IntWidth, Integer, Pass, Tell,
    };
    pub use crate::record::Record;
    pub use crate::repeat::{Repeat, RepeatExactly};
    pub use crate::stream::Stream;
    pub use crate::text::{CString, Encoding, Line, PaddedString, PascalString, StringEncoded};
    pub use crate::value::{Map, Value};
}
