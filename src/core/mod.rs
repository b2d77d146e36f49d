// Core module - Fundamental traits and types
pub mod scanner_trait;

pub use scanner_trait::{ConnectOutcome, NameResolver, PortScanner};
