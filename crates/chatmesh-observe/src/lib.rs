//! Tracing/OpenTelemetry wiring shared by all seven `chatmesh-service`
//! binaries.

pub mod genai_attrs;
pub mod tracing_setup;
