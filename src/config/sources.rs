pub mod env_vars;
pub mod file_source;
