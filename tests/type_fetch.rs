//! Column decode coverage across the full wire-type set, LOB segmentation
//! in both directions, and null handling.

mod common;

use auriga::transport::mock::{MockColumn, MockTransport, MockValue};
use auriga::types::{WireType, DECIMAL_PRECISION, DECIMAL_SCALE, DECIMAL_WIRE_LEN};
use auriga::{DateFormat, DriverError, Param, ParamTag, Value};
use chrono::NaiveDate;
use common::connect;
use rand::{Rng, SeedableRng};

fn sample_date() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2009, 10, 27)
        .expect("date")
        .and_hms_opt(12, 34, 56)
        .expect("time")
}

fn typed_table() -> MockTransport {
    let columns = vec![
        MockColumn::new("c_int1", WireType::Integer, 1),
        MockColumn::new("c_int2", WireType::Integer, 2),
        MockColumn::new("c_int4", WireType::Integer, 4),
        MockColumn::new("c_int8", WireType::Integer, 8),
        MockColumn::new("c_float4", WireType::Float, 4),
        MockColumn::new("c_float8", WireType::Float, 8),
        MockColumn::new("c_money", WireType::Money, 8),
        MockColumn::new("c_char", WireType::Char, 8),
        MockColumn::new("c_vch", WireType::Varchar, 32),
        MockColumn::new("c_byte", WireType::Byte, 16),
        MockColumn::new("c_nchar", WireType::NChar, 12),
        MockColumn::new("c_nvch", WireType::NVarchar, 64),
        MockColumn::decimal("c_dec", DECIMAL_WIRE_LEN, DECIMAL_PRECISION, DECIMAL_SCALE),
        MockColumn::new("c_date", WireType::Timestamp, 8),
    ];
    let row = vec![
        MockValue::Int(-5),
        MockValue::Int(-300),
        MockValue::Int(70_000),
        MockValue::Int(i64::MAX),
        MockValue::Float(2.5),
        MockValue::Float(3.5),
        MockValue::Money(12.5),
        MockValue::Str("abc".into()),
        MockValue::Str("hello world".into()),
        MockValue::Bytes(vec![1, 2, 32, 32]),
        MockValue::Str("gr\u{fc}n".into()),
        MockValue::Str("\u{4e2d}\u{6587} \u{1F600}".into()),
        MockValue::Decimal("123.45".into()),
        MockValue::Date(sample_date()),
    ];
    let nulls = vec![MockValue::Null; row.len()];
    MockTransport::new().with_table("typed", columns, vec![row, nulls])
}

#[test]
fn every_wire_type_decodes_to_the_expected_host_value() {
    let mut conn = connect(typed_table());
    let rows = conn.execute("SELECT * FROM typed", &[]).expect("select");
    assert_eq!(rows.len(), 2);

    let row = &rows[0];
    assert_eq!(row[0], Value::Int(-5));
    assert_eq!(row[1], Value::Int(-300));
    assert_eq!(row[2], Value::Int(70_000));
    assert_eq!(row[3], Value::Int(i64::MAX));
    assert_eq!(row[4], Value::Float(2.5));
    assert_eq!(row[5], Value::Float(3.5));
    // Money travels as fixed-point cents and comes back divided by 100.
    assert_eq!(row[6], Value::Float(12.5));
    // Fixed char is stored padded and comes back trimmed.
    assert_eq!(row[7], Value::Str("abc".into()));
    assert_eq!(row[8], Value::Str("hello world".into()));
    // Byte columns keep trailing whitespace bytes verbatim.
    assert_eq!(row[9], Value::Bytes(vec![1, 2, 32, 32]));
    assert_eq!(row[10], Value::Str("gr\u{fc}n".into()));
    assert_eq!(row[11], Value::Str("\u{4e2d}\u{6587} \u{1F600}".into()));
    assert_eq!(row[12], Value::Str("123.45".into()));
    assert_eq!(row[13], Value::Str("2009-10-27 12:34:56".into()));

    // Null columns decode to the null marker, never to zero or "".
    for v in &rows[1] {
        assert_eq!(*v, Value::Null);
    }
}

#[test]
fn type_name_vocabulary_in_metadata() {
    let mut conn = connect(typed_table());
    conn.execute(
        "SELECT c_int4, c_float8, c_money, c_char, c_vch, c_byte, c_dec, c_date FROM typed",
        &[],
    )
    .expect("select");
    assert_eq!(
        conn.data_types(),
        &["INTEGER", "DOUBLE", "DOUBLE", "STRING", "VARCHAR", "BYTE", "STRING", "DATE"]
    );
}

#[test]
fn date_rendering_follows_the_session_format() {
    let mut conn = connect(typed_table());
    conn.set_date_format(DateFormat::Us).expect("set format");
    let rows = conn.execute("SELECT c_date FROM typed", &[]).expect("select");
    assert_eq!(rows[0][0], Value::Str("10/27/2009 12:34:56".into()));
}

#[test]
fn lob_fetch_reassembles_segments_byte_identically() {
    let seg = 64usize;
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let payload: Vec<u8> = (0..seg * 3 + 1).map(|_| rng.gen()).collect();

    let transport = MockTransport::new().with_segment_size(seg).with_table(
        "blobs",
        vec![
            MockColumn::new("id", WireType::Integer, 4),
            MockColumn::new("data", WireType::LongByte, seg),
        ],
        vec![vec![MockValue::Int(1), MockValue::Bytes(payload.clone())]],
    );
    let mut conn = connect(transport);
    let rows = conn.execute("SELECT data FROM blobs", &[]).expect("select");
    assert_eq!(rows, vec![vec![Value::Bytes(payload.clone())]]);
    // The reported byte length is the assembled length.
    assert_eq!(conn.data_sizes(), &[payload.len()]);
}

#[test]
fn lob_bind_splits_into_segments_and_roundtrips() {
    let seg = 64usize;
    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    let payload: Vec<u8> = (0..seg * 2 + 5).map(|_| rng.gen()).collect();

    let transport = MockTransport::new().with_segment_size(seg).with_table(
        "blobs",
        vec![
            MockColumn::new("id", WireType::Integer, 4),
            MockColumn::new("data", WireType::LongByte, seg),
        ],
        Vec::new(),
    );
    let mut conn = connect(transport);
    conn.execute(
        "INSERT INTO blobs (id, data) VALUES (?,?)",
        &[
            Param::new(ParamTag::Integer, 1i64),
            Param::new(ParamTag::LongByte, payload.clone()),
        ],
    )
    .expect("insert");
    // One put for the id, three for the segmented LOB.
    assert_eq!(conn.transport().put_calls(), 4);

    let rows = conn.execute("SELECT data FROM blobs", &[]).expect("select");
    assert_eq!(rows, vec![vec![Value::Bytes(payload)]]);
}

#[test]
fn long_varchar_fetch_decodes_text() {
    let seg = 32usize;
    let text: String = "segmented text, ".repeat(20);
    let transport = MockTransport::new().with_segment_size(seg).with_table(
        "docs",
        vec![MockColumn::new("body", WireType::LongVarchar, seg)],
        vec![vec![MockValue::Str(text.clone())]],
    );
    let mut conn = connect(transport);
    let rows = conn.execute("SELECT body FROM docs", &[]).expect("select");
    assert_eq!(rows, vec![vec![Value::Str(text)]]);
    assert_eq!(conn.data_types(), &["LOB"]);
}

#[test]
fn long_national_varchar_transcodes_whole_buffer() {
    let seg = 32usize;
    let text: String = "\u{4e2d}\u{6587}\u{1F600} ".repeat(12);
    let transport = MockTransport::new().with_segment_size(seg).with_table(
        "docs",
        vec![MockColumn::new("body", WireType::LongNVarchar, seg)],
        vec![vec![MockValue::Str(text.clone())]],
    );
    let mut conn = connect(transport);
    let rows = conn.execute("SELECT body FROM docs", &[]).expect("select");
    assert_eq!(rows, vec![vec![Value::Str(text)]]);
}

#[test]
fn unknown_wire_types_fall_back_to_char_with_a_diagnostic() {
    let transport = MockTransport::new().with_table(
        "odd",
        vec![MockColumn::new("mystery", WireType::Unknown(77), 8)],
        vec![vec![MockValue::Str("zz".into())]],
    );
    let mut conn = connect(transport);
    let rows = conn.execute("SELECT mystery FROM odd", &[]).expect("select");
    assert_eq!(rows, vec![vec![Value::Str("zz".into())]]);
    assert_eq!(conn.diagnostics().len(), 1);
    assert!(conn.diagnostics()[0].contains("77"));
    assert_eq!(conn.data_types(), &["UNMAPPED_DATATYPE"]);
}

#[test]
fn decimal_binds_through_the_format_conversion_call() {
    let transport = MockTransport::new().with_table(
        "money",
        vec![MockColumn::decimal(
            "amount",
            DECIMAL_WIRE_LEN,
            DECIMAL_PRECISION,
            DECIMAL_SCALE,
        )],
        Vec::new(),
    );
    let mut conn = connect(transport);
    conn.execute(
        "INSERT INTO money (amount) VALUES (?)",
        &[Param::new(ParamTag::Decimal, "-1042.75")],
    )
    .expect("insert");
    let rows = conn.execute("SELECT amount FROM money", &[]).expect("select");
    assert_eq!(rows, vec![vec![Value::Str("-1042.75".into())]]);
}

#[test]
fn malformed_decimal_fails_the_statement() {
    let mut conn = common::conn_with_t();
    let err = conn
        .execute(
            "INSERT INTO t (name) VALUES (?)",
            &[Param::new(ParamTag::Decimal, "not a number")],
        )
        .expect_err("bad decimal");
    assert!(matches!(err, DriverError::Transport(_)));
}

#[test]
fn national_values_roundtrip_through_binds() {
    let transport = MockTransport::new().with_table(
        "names",
        vec![MockColumn::new("who", WireType::NVarchar, 64)],
        Vec::new(),
    );
    let mut conn = connect(transport);
    let name = "Bj\u{f6}rk \u{1F3B5}";
    conn.execute(
        "INSERT INTO names (who) VALUES (?)",
        &[Param::new(ParamTag::NVarchar, name)],
    )
    .expect("insert");
    let rows = conn.execute("SELECT who FROM names", &[]).expect("select");
    assert_eq!(rows, vec![vec![Value::Str(name.into())]]);
}
