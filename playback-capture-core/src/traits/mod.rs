pub mod capture_backend;
pub mod frame_sink;
pub mod presence;
pub mod session_delegate;
