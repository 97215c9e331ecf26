pub mod http;
pub mod memory;
pub mod storage;

pub use http::RestApiClient;
pub use memory::InMemoryDirectory;
pub use storage::LocalStorage;
