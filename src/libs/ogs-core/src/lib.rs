//! NextGCore Core Utilities Library
//!
//! Fixed-capacity object pools with generation-tagged handles, and the
//! timer manager built on top of them.

pub mod pool; // Object pool
pub mod timer; // Timer manager

pub use pool::{OgsPool, OgsPoolId};
pub use timer::{OgsTimerId, OgsTimerMgr};
