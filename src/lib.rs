//! Network topology pipeline: turns georeferenced trail polylines into a
//! routable, topologically clean vertex/edge graph.
//!
//! The nine stages run in [`pipeline::Pipeline::run`], strictly in order:
//! Preprocessor, Trail-Level Bridging, Noder, Welder, Gap Bridger, Connector
//! Integrator, Edge Deduplicator, Short Dead-End Pruner, and the Degree-2
//! Chain Compactor.

pub mod config;
pub mod error;
pub mod geom;
pub mod model;
pub mod pipeline;
pub mod spatial;
pub mod stages;
pub mod store;
