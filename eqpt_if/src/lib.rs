//! # Equipment interface crate.
//!
//! Provides the narrow interfaces through which the navigation core reads sensors and commands
//! actuators. Device drivers (and the simulator) implement these traits, the core only ever sees
//! `dyn` trait objects bundled into a [`eqpt::Hardware`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Equipment traits and the data types exchanged through them
pub mod eqpt;
