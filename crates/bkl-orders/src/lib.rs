//! Pure domain logic for the backline marketplace: inclusive date spans,
//! integer pricing, the order lifecycle table, and the shared error type.
//! No I/O here; persistence lives in `bkl-db`.

pub mod dates;
pub mod error;
pub mod lifecycle;
pub mod pricing;

pub use dates::DateSpan;
pub use error::{Error, Result};
