//! Customer outreach prioritisation.
//!
//! Turns raw order ledgers into a ranked, cooldown-aware contact list plus an
//! unfiltered customer overview. See [`workflows::outreach::OutreachPipeline`]
//! for the entry point.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
