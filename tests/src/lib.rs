//! # Diagnostic Bus Test Suite
//!
//! Cross-crate tests for the diagnostic bus.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs        # Observer attach, publish, logging, shutdown
//!     └── concurrency.rs  # Dispose/publish races, concurrent registration
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p diag-tests
//! cargo test -p diag-tests integration::concurrency::
//! ```

#![allow(dead_code)]
