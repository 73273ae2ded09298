//! Object-reuse contract for nested message allocation.
//!
//! Decoders for message types configured as pooled obtain fresh nested
//! instances through [`Pooled::acquire`] instead of `Default::default`. The
//! pool itself lives outside of this crate; implementors must uphold:
//!
//! * `acquire` returns an instance equivalent to `Self::default()`.
//! * No instance is handed out twice while another reference to it is live.

pub trait Pooled: Default {
    /// Returns a zeroed instance, reusing a previously released one if the
    /// pool has any.
    fn acquire() -> Self {
        Self::default()
    }
}
