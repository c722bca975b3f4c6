//! Runs a build tool (CMake unless configured otherwise) with the wrapper's
//! own arguments passed through untouched, prints the command line first,
//! and exits the way the tool exited.

pub mod cli;
pub mod config;
pub mod invoker;
pub mod shell;

#[cfg(not(any(unix, windows)))]
compile_error!("Unsupported target OS");
