use core::fmt;

/// Error returned by a synthesized decode procedure.
///
/// Every kind is terminal for the decode call that produced it. The message
/// being decoded into is left in an unspecified, possibly partially filled
/// state and should be discarded by the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
}

impl DecodeError {
    /// Returns the [`DecodeErrorKind`] describing this error.
    #[inline]
    pub const fn kind(&self) -> DecodeErrorKind {
        self.kind
    }

    /// Returns `true` if this error was caused by input that ended early.
    ///
    /// Truncated input surfaces as either [`DecodeErrorKind::Truncated`] or,
    /// when the cut lands inside a length prefix that then claims more bytes
    /// than exist, [`DecodeErrorKind::InvalidLength`].
    pub fn is_truncation(&self) -> bool {
        matches!(
            self.kind,
            DecodeErrorKind::Truncated | DecodeErrorKind::InvalidLength
        )
    }

    #[cold]
    #[inline(never)]
    pub fn truncated() -> Self {
        DecodeErrorKind::Truncated.into()
    }

    #[cold]
    #[inline(never)]
    pub fn overflow() -> Self {
        DecodeErrorKind::Overflow.into()
    }

    #[cold]
    #[inline(never)]
    pub fn invalid_length() -> Self {
        DecodeErrorKind::InvalidLength.into()
    }

    #[cold]
    #[inline(never)]
    pub fn unexpected_end_of_group() -> Self {
        DecodeErrorKind::UnexpectedEndOfGroup.into()
    }

    #[cold]
    #[inline(never)]
    pub fn malformed_tag(reason: MalformedTagReason) -> Self {
        DecodeErrorKind::MalformedTag { reason }.into()
    }

    #[cold]
    #[inline(never)]
    pub fn invalid_wire_type(value: u8) -> Self {
        DecodeErrorKind::InvalidWireType { value }.into()
    }

    #[cold]
    #[inline(never)]
    pub fn wire_type_mismatch(field: &'static str, wire_type: u8) -> Self {
        DecodeErrorKind::WireTypeMismatch { field, wire_type }.into()
    }

    #[cold]
    #[inline(never)]
    pub fn required_field_missing(message: &'static str) -> Self {
        DecodeErrorKind::RequiredFieldMissing { message }.into()
    }

    #[cold]
    #[inline(never)]
    pub fn invalid_utf8(field: &'static str) -> Self {
        DecodeErrorKind::InvalidUtf8 { field }.into()
    }

    #[cold]
    #[inline(never)]
    pub fn recursion_limit_reached() -> Self {
        DecodeErrorKind::RecursionLimitReached.into()
    }
}

impl From<DecodeErrorKind> for DecodeError {
    #[inline]
    fn from(kind: DecodeErrorKind) -> Self {
        DecodeError { kind }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode protobuf message: {}", self.kind)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// A read or a length-delimited span needs more bytes than remain.
    Truncated,
    /// A varint kept its continuation bit set past 64 bits of shift.
    Overflow,
    /// A decoded length cannot be represented as an in-bounds offset.
    InvalidLength,
    /// An end-group marker appeared with no open group.
    UnexpectedEndOfGroup,
    MalformedTag { reason: MalformedTagReason },
    /// Wire type 6 or 7, neither of which exists.
    InvalidWireType { value: u8 },
    WireTypeMismatch { field: &'static str, wire_type: u8 },
    RequiredFieldMissing { message: &'static str },
    InvalidUtf8 { field: &'static str },
    RecursionLimitReached,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::Truncated => write!(f, "unexpected end of buffer"),
            DecodeErrorKind::Overflow => write!(f, "varint overflows 64 bits"),
            DecodeErrorKind::InvalidLength => write!(f, "invalid length prefix"),
            DecodeErrorKind::UnexpectedEndOfGroup => {
                write!(f, "end-group marker without a matching start-group")
            }
            DecodeErrorKind::MalformedTag { reason } => write!(f, "malformed tag: {reason}"),
            DecodeErrorKind::InvalidWireType { value } => {
                write!(f, "invalid 'wire type' value: {value}")
            }
            DecodeErrorKind::WireTypeMismatch { field, wire_type } => {
                write!(f, "wrong wire type {wire_type} for field '{field}'")
            }
            DecodeErrorKind::RequiredFieldMissing { message } => {
                write!(f, "required field not set in '{message}'")
            }
            DecodeErrorKind::InvalidUtf8 { field } => {
                write!(f, "invalid UTF-8 in string field '{field}'")
            }
            DecodeErrorKind::RecursionLimitReached => write!(f, "recursion limit reached"),
        }
    }
}

/// Why a field key was rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MalformedTagReason {
    /// The key varint does not fit in 32 bits.
    KeyTooLarge,
    /// Field number zero, or above the protobuf maximum.
    FieldNumberOutOfRange,
    /// An end-group wire type outside of any group.
    EndGroupOutsideGroup,
}

impl fmt::Display for MalformedTagReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            MalformedTagReason::KeyTooLarge => "key does not fit in 32 bits",
            MalformedTagReason::FieldNumberOutOfRange => "field number out of range",
            MalformedTagReason::EndGroupOutsideGroup => "end group wire type for non-group",
        };
        f.write_str(reason)
    }
}
