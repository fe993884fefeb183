//! Kismet capture database access.
//!
//! Kismet writes one `SQLite` database per capture session. This module
//! reads those databases (never writes them), locates them on disk, and
//! computes the time windows used by the live tracker.

pub mod db;
pub mod discover;
#[cfg(test)]
pub(crate) mod fixture;
pub mod windows;

pub use db::{KismetDb, KismetDevice, ProbeRecord};
pub use discover::{modified_within, newest, resolve};
pub use windows::{TimeBoundaries, TimeWindows};
