//! Behavioural suites driving a helper over a real endpoint.

mod behaviour;
mod support;
