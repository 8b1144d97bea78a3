//! Drive a running MATLAB session from Rust.
//!
//! [`Interactor`] is the operation set: evaluate commands, call functions,
//! read and write variables, and hand values over by reference through an
//! opaque [`StoredToken`]. [`RemoteProxy`] implements it on top of any
//! [`Transport`](transport::Transport).

pub mod banner;
pub mod commands;
pub mod config;
pub mod consts;
pub mod error;
pub mod history;
pub mod interactor;
pub mod proxy;
pub mod transport;
pub mod value;

pub use error::{InvocationError, InvocationFailure, Result};
pub use interactor::{Interactor, StoredToken};
pub use proxy::{ProxyConfig, RemoteProxy};
pub use value::Value;
