//! Fusion Core
//!
//! Core types shared by the Fusion side-effect dispatcher.
//!
//! This crate contains:
//! - Domain types: lifecycle events, pipelines, script results, content summaries
//! - DTOs: request shapes accepted by the pipeline catalog

pub mod domain;
pub mod dto;
