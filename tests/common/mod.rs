//! Shared fixtures for the integration tests: an in-memory engine seeded
//! with a few tables, wrapped in a connected driver session.
#![allow(dead_code)]

use auriga::transport::mock::{MockColumn, MockTransport};
use auriga::types::WireType;
use auriga::Connection;

/// A one-column integer table named `t`, empty.
pub fn ids_table(transport: MockTransport) -> MockTransport {
    transport.with_table(
        "t",
        vec![
            MockColumn::new("id", WireType::Integer, 4),
            MockColumn::new("name", WireType::Varchar, 32),
        ],
        Vec::new(),
    )
}

/// Connect a fresh session over the given engine.
pub fn connect(transport: MockTransport) -> Connection<MockTransport> {
    let mut conn = Connection::new(transport);
    conn.connect("testdb", None, None).expect("connect");
    conn
}

/// Shorthand for a connected session over an empty `t` table.
pub fn conn_with_t() -> Connection<MockTransport> {
    connect(ids_table(MockTransport::new()))
}
