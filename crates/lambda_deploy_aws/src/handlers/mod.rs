pub mod archive;
pub mod deploy;
pub mod event_sources;
pub mod schedule;
pub mod storage_triggers;
