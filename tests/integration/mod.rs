//! Integration tests for the cosmos repository

mod concurrency;
mod config_loading;
mod query_pipeline;
