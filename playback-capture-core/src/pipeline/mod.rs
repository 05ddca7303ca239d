pub mod device_pipeline;
pub mod forwarder;
pub mod stop_signal;
