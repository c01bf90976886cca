//! SeaORM entity definitions for the dropsync database schema.

pub mod order_record;
pub mod prelude;
pub mod sync_phase;
pub mod sync_status;
