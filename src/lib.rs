//! auriga - client driver binding for the Auriga call-level interface
//! ------------------------------------------------------------------
//! The marshaling and statement-execution core of a database driver meant
//! to sit under a dynamic scripting host: wire value encode/decode for the
//! full column-type set, lexical statement classification, the session and
//! transaction/savepoint state machine, and the synchronous execution
//! pipeline. The vendor call-level library is abstracted behind the
//! [`transport::Transport`] trait; an in-memory engine for tests lives in
//! [`transport::mock`].

pub mod classify;
pub mod codec;
pub mod connection;
pub mod error;
pub mod exec;
pub mod transport;
pub mod types;
pub mod unicode;

pub use connection::Connection;
pub use error::{DriverError, DriverResult};
pub use transport::{ConnectOptions, DateFormat, Transport};
pub use types::{Param, ParamTag, Value};
