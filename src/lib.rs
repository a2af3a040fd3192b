//! NEWSWATCH: economic-calendar release watcher.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod auth;
pub mod browser;
pub mod calendar;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod notify;
pub mod storage;
pub mod strategy;
pub mod types;
