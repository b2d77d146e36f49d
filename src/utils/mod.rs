//! Input parsing for scan definitions

pub mod address_parser;
pub mod port_parser;
