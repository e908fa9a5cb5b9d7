pub mod column_ref;
pub mod config;
pub mod equal_set;
