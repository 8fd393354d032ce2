//! End-to-end tests for the SubHub infrastructure clients live under `tests/`.

#![forbid(unsafe_code)]
