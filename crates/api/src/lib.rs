//! HTTP surface for the analysis service.

pub mod app;
