//! Hour-cell booking selection over a weekly grid: venue availability and
//! bookings decide which cells can be picked, drags and day toggles edit a
//! selection that spans weeks, and every change is reported as merged ranges.

pub mod config;
pub mod engine;
pub mod feed;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod registry;
pub mod timekey;
