//! Catalog synchronization pipeline.
//!
//! Pulls a paginated product feed from the upstream ERP source, republishes
//! each record onto a Postgres-backed work queue, and maps queued records
//! into the local catalog one message at a time. The import side is
//! checkpointed so an interrupted run resumes at the last completed page.

pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod consumer;
pub mod gateway;
pub mod import;
pub mod mapping;
pub mod publish;
pub mod queue;
pub mod tracing;

pub mod model {
    pub mod product;
    pub mod transfer;
}

pub mod repo {
    pub mod products;
    pub mod refs;
}

pub mod util {
    pub mod db;
    pub mod env;
}

#[cfg(test)]
pub mod testutil;
