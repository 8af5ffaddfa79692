//! Sales profit modelling
//!
//! Loads order-line sales data, derives model features, trains and compares
//! several regression families on a profit target, and forecasts coming months
//! with the best one.

pub mod config;
pub mod data;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod telemetry;

pub use error::{Result, SalesMlError};
