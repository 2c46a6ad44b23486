pub mod extract;
pub mod oracle;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod sse_parser;
pub mod types;
