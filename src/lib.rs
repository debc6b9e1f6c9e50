//! Apply a templated configuration file to a Cisco IOS-XR device over SSH.
//!
//! The flow is linear: render the template, then (unless dry-run) connect,
//! optionally back up the running configuration, send the lines, commit and
//! write an apply log.

pub mod apply;
pub mod backup;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod ssh;
pub mod template;
