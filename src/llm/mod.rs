pub mod decoder;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod types;
