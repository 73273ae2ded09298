//! Runtime support for synthesized protobuf decoders.
//!
//! Code emitted by `protodec-build` calls into this crate for every primitive
//! read: [`DecodeCursor`] owns the bounds checks, [`DecodeError`] classifies
//! every failure, and [`DecodeMessage`] is the entry point each generated
//! message type implements.

#![no_std]
#![deny(clippy::as_conversions)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bitset;
pub mod cursor;
pub mod error;
pub mod message;
pub mod packed;
pub mod pool;
pub mod varint;
pub mod well_known;
pub mod wire;

mod util;

pub use bitset::RequiredFieldBitset;
pub use cursor::DecodeCursor;
pub use error::{DecodeError, DecodeErrorKind, MalformedTagReason};
pub use message::{DecodeMessage, ExtensionField, Extensions};
pub use pool::Pooled;
pub use wire::WireType;
