//! Driving adapters: file formats consumed and produced by the operator CLI.

pub mod csv;
