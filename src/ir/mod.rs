//! Intermediate representation of the hardware pipeline.
//!
//! The graph mirrors Ninja's model: actions become rules and nodes become
//! build edges. Nothing here knows about FPGA tools; builders and the
//! pipeline composer fill it in, and [`crate::ninja_gen`] renders it.
//!
//! # Examples
//!
//! ```
//! use fpgaforge::ir::{Action, Alias, BuildEdge, BuildGraph};
//! use camino::Utf8PathBuf;
//!
//! let mut graph = BuildGraph::default();
//! graph.add_action("pack", Action::new("icepack $in $out")).unwrap();
//! graph
//!     .add_edge(BuildEdge {
//!         action_id: "pack".into(),
//!         inputs: vec![Utf8PathBuf::from("_build/hardware.asc")],
//!         explicit_outputs: vec![Utf8PathBuf::from("_build/hardware.bin")],
//!         ..BuildEdge::default()
//!     })
//!     .unwrap();
//! graph
//!     .add_alias(Alias::new("build", vec!["_build/hardware.bin".into()]))
//!     .unwrap();
//! assert!(graph.edge("build").is_some_and(|edge| edge.phony));
//! ```

pub mod cmd_interpolate;
mod cycle;
mod graph;

pub use graph::{Action, Alias, BuildEdge, BuildGraph, IrGenError};
