//! Host integration: versioned JSON envelopes over stdin/stdout.

pub mod contract;
pub mod handler;
pub mod stdio;
