//! Input sources feeding the ingest pipeline.

pub mod mqtt;
