//! Exploratory reporting over raw tables and merged portfolios

pub mod distributions;
pub mod regional;
pub mod schema;
