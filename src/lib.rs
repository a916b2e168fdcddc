//! fulllines: bulk extraction and search of multi-language dialogue lines
//!
//! Sections listed in a catalog are fetched from a remote JSON service one
//! file at a time, annotated with speaker and conversation ids, and stored
//! in SQLite. Progress is derived from stored rows, so interrupted runs can
//! be resumed without a checkpoint file.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod lookup;
pub mod progress;
pub mod search;
pub mod tracker;
