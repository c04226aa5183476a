//! Shared test setup.
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//! }
//! ```
//!
//! `RUST_LOG` selects what is printed, e.g. `RUST_LOG=nametree=trace`.
//! `NAMETREE_LOG_CONSOLE=0` silences output even when `RUST_LOG` is set.

#![allow(dead_code)]

use std::env;
use std::sync::Once;

use nametree::Name;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

static INIT: Once = Once::new();

/// Installs a test-writer subscriber. Only the first call has an effect.
pub fn init_tracing() {
    INIT.call_once(setup_tracing);
}

fn make_filter(default_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{default_level}")))
}

fn setup_tracing() {
    if env::var("NAMETREE_LOG_CONSOLE").is_ok_and(|v| v == "0") {
        return;
    }
    let console_layer = tracing_subscriber::fmt::layer()
        .with_test_writer()
        .with_target(true)
        .with_line_number(true)
        .compact()
        .with_filter(make_filter(Level::WARN));

    // Another test binary may have installed one already.
    let _ = Registry::default().with(console_layer).try_init();
}

pub fn name(s: &str) -> Name {
    s.parse().unwrap()
}
