pub mod analysis;
pub mod openapi;
pub mod server_infra;
pub mod test_history;
pub mod timeseries;
