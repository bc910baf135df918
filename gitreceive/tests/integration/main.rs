#![cfg(unix)]

#[path = "../common/mod.rs"]
mod common;

mod command_tests;
mod hook_tests;
mod key_tests;
mod run_tests;
