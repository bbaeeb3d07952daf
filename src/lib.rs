#![forbid(unsafe_code)]

//! Keeps the video links of an annotation dataset fresh: finds links that no
//! longer resolve, looks for re-uploads of the same video and records every
//! change in a reviewable report.

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod duration;
pub mod liveness;
pub mod matcher;
pub mod refresh;
pub mod text;
pub mod youtube;
