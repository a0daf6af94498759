//! Stories about managing catalogs through the management API
//!
//! - `basic`: a catalog is created, updated in place, recreated with its
//!   original settings and finally destroyed
//! - `disappears`: a catalog is deleted behind the caller's back and the
//!   removal is observed through the convergence poller

mod basic;
mod disappears;
mod helpers;
