//! Request and response bodies
//!
//! Every body is camelCase JSON; amounts are decimal strings.

pub mod bills;
pub mod trips;
