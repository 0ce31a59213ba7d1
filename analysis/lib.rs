#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod data;
pub mod linalg;
pub mod model;
pub mod ols;
pub mod pipeline;
pub mod report;
pub mod segment;
pub mod stats;
