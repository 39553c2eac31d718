//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises the connection core
//! against mock ports. All tests run on the host with no real printer,
//! network, or USB stack.

mod mock_ports;
mod planner_tests;
