#[macro_use]
extern crate cfg_if;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod sys;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod link;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod cli;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use crate::link::{query, Duplex, LinkStatus, QueryError};
