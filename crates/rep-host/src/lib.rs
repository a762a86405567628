//! Capture-ingest host: reads framed control messages from the capture agent
//! and applies them to the live buffer.

pub mod config;
pub mod framing;
pub mod ingest;
pub mod logging;
