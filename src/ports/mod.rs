//! Port traits for the external collaborators.

pub mod broker_port;
pub mod config_port;
pub mod market_data_port;
pub mod model_port;
pub mod performance_port;
