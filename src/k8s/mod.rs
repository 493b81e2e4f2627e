pub mod client;
pub mod jobs;
pub mod pods;
pub mod resources;

pub use client::K8sClient;
