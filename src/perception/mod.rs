pub mod file_source;
pub mod serializer;
pub mod traits;
pub mod types;
