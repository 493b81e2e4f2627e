pub mod analysis_history;
pub mod endpoint;
pub mod openapi_spec;
pub mod openapi_spec_version;
pub mod parameter;
pub mod project;
pub mod scenario_history;
pub mod server_infra;
pub mod stage_history;
pub mod test_header_history;
pub mod test_history;
pub mod test_metrics_timeseries;
pub mod test_parameter_history;
pub mod test_resource_timeseries;
