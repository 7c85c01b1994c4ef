//! Integration tests for the simulation kernel, scenarios, and wire
//! protocol.

mod invariant_tests;
mod kernel_tests;
mod message_tests;
mod scenario_tests;
