pub mod blueprint;
pub mod bootstrap;
pub mod config;
pub mod migrate;
pub mod runtime;
pub mod site;
pub mod sqlite_store;
