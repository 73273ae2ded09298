//! Decoders generated by `protodec-build` at build time, checked against
//! buffers encoded by `prost` in this crate's tests.

include!(concat!(env!("OUT_DIR"), "/conformance.rs"));

impl protodec::Pooled for Inner {}
