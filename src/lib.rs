//! Crony - distributed cron-style job scheduler
//!
//! A single scheduler scans the job store for due jobs and pushes their ids
//! onto a Redis work queue; any number of workers pop ids, run the job's
//! action under a deadline and record the outcome with retry and backoff.

#![allow(missing_docs)]

pub mod app_info;
pub mod boot;
pub mod cli;
pub mod commands;
pub mod config;
pub mod database;
pub mod environment;
pub mod job_store;
pub mod jobs;
pub mod setup_tracing;
pub mod work_queue;
