//! Route-level tests running the real engine against a temp-file database, with gateway outcomes
//! pinned per test.

mod helpers;
mod orders;
mod payments;
mod ws;
