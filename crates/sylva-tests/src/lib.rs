//! Integration and property tests for the sylva engine live under
//! `tests/`; this crate exports nothing.
