//! Back ends that consume decode plans.

pub mod interp;
pub mod rust;
