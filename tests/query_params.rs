//! Placeholder rewriting, parameter binding and statement dispatch through
//! the execution pipeline.

mod common;

use auriga::transport::mock::{MockTransport, MockValue};
use auriga::{DriverError, Param, ParamTag, Value};
use common::{conn_with_t, connect};

#[test]
fn one_placeholder_produces_exactly_one_bind_call() {
    let mut conn = conn_with_t();
    conn.execute(
        "INSERT INTO t (id) VALUES (?)",
        &[Param::new(ParamTag::Integer, 41i64)],
    )
    .expect("insert");
    assert_eq!(conn.transport().put_calls(), 1);
    assert_eq!(conn.rows_affected(), 1);

    let rows = conn.execute("SELECT id FROM t", &[]).expect("select");
    assert_eq!(rows, vec![vec![Value::Int(41)]]);
}

#[test]
fn multiple_parameters_bind_in_order() {
    let mut conn = conn_with_t();
    conn.execute(
        "INSERT INTO t (id, name) VALUES (?,?)",
        &[
            Param::new(ParamTag::Integer, 1i64),
            Param::new(ParamTag::Varchar, "first"),
        ],
    )
    .expect("insert");
    let rows = conn.execute("SELECT id, name FROM t", &[]).expect("select");
    assert_eq!(rows, vec![vec![Value::Int(1), Value::Str("first".into())]]);
}

#[test]
fn arity_mismatch_fails_before_any_wire_traffic() {
    let mut conn = conn_with_t();
    let err = conn
        .execute("INSERT INTO t (id) VALUES (?)", &[])
        .expect_err("missing parameter");
    match err {
        DriverError::Malformed(msg) => assert!(msg.contains("placeholder")),
        other => panic!("expected malformed error, got {:?}", other),
    }
    // Nothing was sent: no bind calls, no rows, no open transaction.
    assert_eq!(conn.transport().put_calls(), 0);
    assert_eq!(conn.transport().row_count("t"), 0);
    assert!(!conn.in_transaction());

    let err = conn
        .execute(
            "SELECT id FROM t",
            &[Param::new(ParamTag::Integer, 1i64)],
        )
        .expect_err("extra parameter");
    assert!(matches!(err, DriverError::Malformed(_)));
}

#[test]
fn quoted_question_marks_are_literals_not_placeholders() {
    let mut conn = conn_with_t();
    conn.execute("INSERT INTO t (id, name) VALUES (1, '?')", &[])
        .expect("insert");
    let rows = conn.execute("SELECT name FROM t", &[]).expect("select");
    assert_eq!(rows, vec![vec![Value::Str("?".into())]]);
}

#[test]
fn tag_value_mismatch_fails_before_any_wire_traffic() {
    let mut conn = conn_with_t();
    let err = conn
        .execute(
            "INSERT INTO t (id) VALUES (?)",
            &[Param::new(ParamTag::Integer, "not a number")],
        )
        .expect_err("mismatched tag");
    assert!(matches!(err, DriverError::Encode(_)));
    assert_eq!(conn.transport().put_calls(), 0);
    assert!(!conn.in_transaction());
}

#[test]
fn procedure_call_reports_rows_affected() {
    let mut conn = connect(MockTransport::new().with_procedure("ping", 7));
    let rows = conn.execute("{call ping}", &[]).expect("call");
    assert!(rows.is_empty());
    assert_eq!(conn.rows_affected(), 7);
    let calls = conn.transport().procedure_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "ping");
    assert!(calls[0].1.is_empty());
}

#[test]
fn procedure_parameters_travel_named() {
    let mut conn = connect(MockTransport::new().with_procedure("set_limit", 1));
    conn.execute(
        "{execute procedure set_limit}",
        &[
            Param::named("ceiling", ParamTag::Integer, 42i64),
            Param::named("label", ParamTag::Varchar, "daily"),
        ],
    )
    .expect("call");
    let calls = conn.transport().procedure_calls();
    assert_eq!(calls[0].0, "set_limit");
    assert_eq!(
        calls[0].1,
        vec![
            (Some("ceiling".to_string()), MockValue::Int(42)),
            (Some("label".to_string()), MockValue::Str("daily".into())),
        ]
    );
    // Procedure name plus two parameters: three put calls.
    assert_eq!(conn.transport().put_calls(), 3);
}

#[test]
fn unnamed_procedure_parameters_are_rejected() {
    let mut conn = connect(MockTransport::new().with_procedure("p", 0));
    let err = conn
        .execute("{call p}", &[Param::new(ParamTag::Integer, 1i64)])
        .expect_err("unnamed parameter");
    assert!(matches!(err, DriverError::Malformed(_)));
}

#[test]
fn unterminated_procedure_call_is_fatal() {
    let mut conn = conn_with_t();
    let err = conn.execute("{call broken", &[]).expect_err("no brace");
    match err {
        DriverError::Malformed(msg) => assert!(msg.contains('}')),
        other => panic!("expected malformed error, got {:?}", other),
    }
}

#[test]
fn unsupported_statement_kinds_warn_and_skip() {
    let mut conn = conn_with_t();
    for sql in [
        "COPY t () INTO 'file'",
        "GET DBEVENT",
        "SET AUTOCOMMIT ON",
        "CONNECT otherdb",
        "DISCONNECT",
    ] {
        let rows = conn.execute(sql, &[]).expect(sql);
        assert!(rows.is_empty(), "{} must be a no-op", sql);
    }
    // None of them touched the transport.
    assert!(!conn.in_transaction());
    assert_eq!(conn.transport().commit_calls(), 0);
}

#[test]
fn statement_errors_still_close_the_statement() {
    let mut conn = conn_with_t();
    let err = conn
        .execute("SELECT id FROM missing_table", &[])
        .expect_err("unknown table");
    assert!(matches!(err, DriverError::Transport(_)));
    // The failed statement handle was released: the next one can run.
    conn.execute("SELECT id FROM t", &[]).expect("next statement runs");
}

#[test]
fn transport_errors_carry_diagnostics() {
    let mut conn = conn_with_t();
    let err = conn
        .execute("SELECT id FROM missing_table", &[])
        .expect_err("unknown table");
    match err {
        DriverError::Transport(t) => {
            assert!(!t.diagnostics.is_empty());
            let text = t.to_string();
            assert!(text.contains("SQLSTATE"));
            assert!(text.contains("missing_table"));
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[test]
fn query_metadata_is_retained_until_the_next_execution() {
    let mut conn = conn_with_t();
    conn.execute(
        "INSERT INTO t (id, name) VALUES (?,?)",
        &[
            Param::new(ParamTag::Integer, 5i64),
            Param::new(ParamTag::Varchar, "five"),
        ],
    )
    .expect("insert");

    conn.execute("SELECT id, name FROM t", &[]).expect("select");
    assert_eq!(conn.column_names(), &["id".to_string(), "name".to_string()]);
    assert_eq!(conn.data_types(), &["INTEGER", "VARCHAR"]);
    // id: 4 wire bytes; name: 2-byte prefix + 4 bytes.
    assert_eq!(conn.data_sizes(), &[4, 6]);

    // Overwritten by the next execution.
    conn.execute("SELECT name FROM t", &[]).expect("select again");
    assert_eq!(conn.column_names(), &["name".to_string()]);
}

#[test]
fn result_rows_serialize_for_the_host() {
    let mut conn = conn_with_t();
    conn.execute(
        "INSERT INTO t (id, name) VALUES (1, 'one')",
        &[],
    )
    .expect("insert");
    let rows = conn.execute("SELECT id, name FROM t", &[]).expect("select");
    let json = serde_json::to_string(&rows).expect("serialize");
    assert_eq!(json, r#"[[1,"one"]]"#);
}
