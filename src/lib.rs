//! Render-queue worker that drives a DAW to export per-track stems.
//!
//! The pipeline, leaf-first: [`classify`] maps output filenames to stem
//! categories, [`detect`] infers export completion from file-set
//! stability, [`automation`] drives the renderer through a launch →
//! locate → trigger → await → teardown state machine, [`processor`] runs
//! one job end to end with per-stage failure isolation, and [`worker`]
//! polls the queue forever.

pub mod automation;
pub mod classify;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod processor;
pub mod queue;
pub mod ui;
pub mod worker;
pub mod workspace;
