mod common;
mod metrics;
mod scoring;
