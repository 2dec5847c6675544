//! `bytepeg-core`: bytecode compiler, static verifier, and backtracking
//! parsing virtual machine for the `bytepeg` PEG matching library.
//!
//! This crate implements every module named in the specification; the
//! `bytepeg` facade crate re-exports the public surface under the
//! operator-overloaded `Pattern` API end users are expected to reach for.
//!
//! Grounded on the teacher's `melbi-core`/`melbi` split (`core/src/lib.rs`):
//! a documented, re-export-only core crate root with module declarations in
//! dependency order, one `pub use` block at the bottom gathering the public
//! surface.

pub mod capture;
pub mod charset;
pub mod combinators;
pub mod constructors;
pub mod dump;
pub mod engine;
pub mod env;
pub mod error;
pub mod grammar;
pub mod instruction;
pub mod limits;
pub mod opcode;
pub mod pattern;
pub mod verifier;
pub mod vm;

pub use env::CapturedValue;
pub use error::{PegError, PegResult};
pub use limits::Limits;
pub use pattern::Pattern;
pub use vm::{pattern_match, pattern_match_with_limits, MatchResult};

/// Test-only helpers shared across this crate's and the facade crate's test
/// suites (`SPEC_FULL.md` §2 "Test tooling"). Enabled by the `testing`
/// feature so downstream integration tests can reuse it without pulling
/// `tracing-subscriber` into ordinary builds.
#[cfg(feature = "testing")]
#[doc(hidden)]
pub mod testing {
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Install a `tracing-subscriber` fmt layer once per test binary, gated
    /// by `RUST_LOG` as usual. Safe to call from every test; only the first
    /// call takes effect.
    pub fn init_test_tracing() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }
}
