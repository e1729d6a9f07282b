//! DataRecon engine - the reconciliation core
//!
//! Pure, synchronous comparison of two fully materialized row-sets:
//! key-based set partitioning, chunked field-by-field comparison with
//! numeric tolerance, and structured result assembly. The engine holds no
//! state across invocations and performs no IO; fetching rows and writing
//! reports are the adapters' and the CLI's jobs.

pub mod compare;

pub use compare::{
    compare, CompareError, CompareOptions, Side, DEFAULT_CHUNK_SIZE, NUMERIC_TOLERANCE,
};
