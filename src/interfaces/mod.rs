//! Input/output adapters for the command-line session runner.

pub mod csv;
