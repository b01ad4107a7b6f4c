#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use console_reconciler_core as core;
pub use console_reconciler_k8s_api as k8s;
pub use console_reconciler_poller as poller;
pub use console_reconciler_verify as verify;

mod args;
mod track;


pub use self::args::{Args, Kind};
