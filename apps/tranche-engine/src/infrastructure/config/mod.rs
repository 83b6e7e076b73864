//! Dependency wiring.

mod container;

pub use container::{
    Container, Coordinator, Pool, Reconciler, build_paper_broker, build_rest_broker,
};
