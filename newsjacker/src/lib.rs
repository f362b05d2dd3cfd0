// Library interface for newsjacker modules
// This allows tests and the binary to import modules

pub mod briefs;
pub mod export;
pub mod ingestion;
pub mod llm;
pub mod newsroom;
pub mod selection;
pub mod server;
pub mod titles;
