pub mod decoder;
pub mod message;
pub mod protocol;
pub mod telemetry;
