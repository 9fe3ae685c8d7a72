pub mod http;
pub mod memory;

pub use http::HttpObjectStore;
pub use memory::MemoryObjectStore;
