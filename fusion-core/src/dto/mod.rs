//! Data Transfer Objects
//!
//! Request shapes accepted by the pipeline catalog. They carry raw strings
//! where the catalog must validate (e.g. the event name) before anything is
//! written.

pub mod pipeline;
