//! Download and resume engine for the romm Switch client.
//!
//! This crate is the core named by the system it belongs to: a bounded
//! HTTP/1.1 client, a resumable multi-part downloader, a generic
//! latest-wins worker, a persistent download queue, a platform-aware file
//! planner, and a self-update installer. Everything that renders, reads
//! input, or parses a configuration file lives outside this crate.

pub mod api;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod latest_wins;
pub mod manifest;
pub mod model;
pub mod planner;
pub mod queue;
pub mod selfupdate;
pub mod status;
