//! fpgaforge core library.
//!
//! This library turns an HDL project directory into a build graph for the
//! open FPGA toolchains. Sources are classified and scanned for include
//! dependencies, the constraints file is resolved, and per-architecture
//! builders are composed into targets that are rendered as a Ninja file.

pub mod builders;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod constraints;
pub mod ir;
pub mod ninja_gen;
pub mod pipeline;
pub mod project;
pub mod report;
pub mod runner;
pub mod scanner;
pub mod sources;
