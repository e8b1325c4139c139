//! Bridge frame types and their JSON encoding.

pub mod serializer;
pub mod types;
