//! End-to-end tests running the `hookbridge` binary against its built-in
//! scenarios.

mod helpers;

mod cli_test;
mod exit_test;
mod hooks_test;
mod lifecycle_test;
mod never_settling_test;
mod throw_test;
