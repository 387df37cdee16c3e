//! Repository layer: one stateless struct per table.
//!
//! Every function takes a `&Connection` (or transaction) so the store can
//! compose several calls inside one transaction.

pub mod branch;
pub mod event;
pub mod memory_record;
