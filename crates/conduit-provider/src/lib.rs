//! Provider abstraction: the Provider Registry and Stream Parser
//! (spec.md §4.1, §4.11).

pub mod adapter;
pub mod registry;
pub mod stream_parser;

pub use adapter::{EmbeddingResponse, ProviderAdapter};
pub use registry::ProviderRegistry;
pub use stream_parser::{RawToolCall, StreamParser, StreamSnapshot};
