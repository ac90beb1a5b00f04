//! Unit tests for `fulltrust_envelope` types.
