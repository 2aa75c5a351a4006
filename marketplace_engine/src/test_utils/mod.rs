//! Helpers for integration and endpoint tests: temp-file databases and seeded fixture data.

mod prepare_env;

pub use prepare_env::{init_test_logging, prepare_test_env, seed_marketplace, MarketplaceSeed};
