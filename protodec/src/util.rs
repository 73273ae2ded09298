//! Branch-prediction hints for the decode hot paths.

#[inline(always)]
#[cold]
fn cold_path() {}

/// "Annotation" to hint that a branch of an if-statement is likely to occur.
#[inline(always)]
pub(crate) fn likely(b: bool) -> bool {
    if b {
        true
    } else {
        cold_path();
        false
    }
}

/// "Annotation" to hint that a branch of an if-statement is _not likely_ to occur.
#[inline(always)]
pub(crate) fn unlikely(b: bool) -> bool {
    if b {
        cold_path();
        true
    } else {
        false
    }
}
