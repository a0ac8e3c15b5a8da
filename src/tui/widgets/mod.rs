pub mod error;
pub mod study;
pub mod summary;
