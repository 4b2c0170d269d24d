pub mod datatype;
pub mod queries_operations;
pub mod query_builder;
