pub mod extract;
pub mod redact;
