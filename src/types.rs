//! Shared data model for the marshaling layer
//! -------------------------------------------
//! Wire type ids, one-character bind tags, host values, and the column and
//! parameter descriptors exchanged with the transport.

use serde::Serialize;

/// Packed-decimal wire buffer length in bytes.
pub const DECIMAL_WIRE_LEN: usize = 16;
pub const DECIMAL_PRECISION: i16 = 31;
pub const DECIMAL_SCALE: i16 = 15;
pub const FLOAT_PRECISION: i16 = 31;
pub const FLOAT_SCALE: i16 = 15;
/// Destination buffer length for packed-decimal -> character conversion.
pub const DECIMAL_TEXT_LEN: usize = 42;
/// Destination buffer length for date/time -> character conversion.
pub const DATE_TEXT_LEN: usize = 260;

/// Wire-level type id of a column or parameter, as enumerated by the
/// transport. `Unknown` preserves unrecognized ids so the decode fallback
/// can report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Integer,
    Float,
    Money,
    Decimal,
    Char,
    Varchar,
    LongVarchar,
    Byte,
    VarByte,
    LongByte,
    NChar,
    NVarchar,
    LongNVarchar,
    Text,
    LongText,
    LogicalKey,
    TableKey,
    Date,
    Time,
    Timestamp,
    IntervalYearMonth,
    IntervalDaySecond,
    Unknown(i16),
}

impl WireType {
    pub fn from_id(id: i16) -> WireType {
        match id {
            1 => WireType::Integer,
            2 => WireType::Float,
            3 => WireType::Money,
            4 => WireType::Decimal,
            5 => WireType::Char,
            6 => WireType::Varchar,
            7 => WireType::LongVarchar,
            8 => WireType::Byte,
            9 => WireType::VarByte,
            10 => WireType::LongByte,
            11 => WireType::NChar,
            12 => WireType::NVarchar,
            13 => WireType::LongNVarchar,
            14 => WireType::Text,
            15 => WireType::LongText,
            16 => WireType::LogicalKey,
            17 => WireType::TableKey,
            20 => WireType::Date,
            21 => WireType::Time,
            22 => WireType::Timestamp,
            23 => WireType::IntervalYearMonth,
            24 => WireType::IntervalDaySecond,
            other => WireType::Unknown(other),
        }
    }

    pub fn id(self) -> i16 {
        match self {
            WireType::Integer => 1,
            WireType::Float => 2,
            WireType::Money => 3,
            WireType::Decimal => 4,
            WireType::Char => 5,
            WireType::Varchar => 6,
            WireType::LongVarchar => 7,
            WireType::Byte => 8,
            WireType::VarByte => 9,
            WireType::LongByte => 10,
            WireType::NChar => 11,
            WireType::NVarchar => 12,
            WireType::LongNVarchar => 13,
            WireType::Text => 14,
            WireType::LongText => 15,
            WireType::LogicalKey => 16,
            WireType::TableKey => 17,
            WireType::Date => 20,
            WireType::Time => 21,
            WireType::Timestamp => 22,
            WireType::IntervalYearMonth => 23,
            WireType::IntervalDaySecond => 24,
            WireType::Unknown(id) => id,
        }
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            WireType::Date
                | WireType::Time
                | WireType::Timestamp
                | WireType::IntervalYearMonth
                | WireType::IntervalDaySecond
        )
    }

    /// Large objects are delivered and bound in bounded segments.
    pub fn is_lob(self) -> bool {
        matches!(
            self,
            WireType::LongVarchar | WireType::LongByte | WireType::LongNVarchar | WireType::LongText
        )
    }
}

/// Translate a wire type into the fixed vocabulary the host layer sees in
/// query metadata.
pub fn type_label(t: WireType) -> &'static str {
    match t {
        WireType::LongVarchar | WireType::LongByte | WireType::LongNVarchar | WireType::LongText => {
            "LOB"
        }
        WireType::Char | WireType::NChar | WireType::Decimal => "STRING",
        WireType::Integer => "INTEGER",
        WireType::Float | WireType::Money => "DOUBLE",
        WireType::Byte | WireType::VarByte | WireType::LogicalKey | WireType::TableKey => "BYTE",
        WireType::Text => "TEXT",
        WireType::Varchar | WireType::NVarchar => "VARCHAR",
        t if t.is_temporal() => "DATE",
        _ => "UNMAPPED_DATATYPE",
    }
}

/// One-character bind type tag supplied by the host per parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamTag {
    Integer,
    Byte,
    Char,
    Date,
    Text,
    Float,
    Varchar,
    Decimal,
    NChar,
    NVarchar,
    LongByte,
    LongText,
    LongVarchar,
}

impl ParamTag {
    pub fn from_char(c: char) -> Option<ParamTag> {
        Some(match c {
            'i' => ParamTag::Integer,
            'b' => ParamTag::Byte,
            'c' => ParamTag::Char,
            'd' => ParamTag::Date,
            't' => ParamTag::Text,
            'f' => ParamTag::Float,
            'v' => ParamTag::Varchar,
            'D' => ParamTag::Decimal,
            'n' => ParamTag::NChar,
            'N' => ParamTag::NVarchar,
            'B' => ParamTag::LongByte,
            'T' => ParamTag::LongText,
            'V' => ParamTag::LongVarchar,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            ParamTag::Integer => 'i',
            ParamTag::Byte => 'b',
            ParamTag::Char => 'c',
            ParamTag::Date => 'd',
            ParamTag::Text => 't',
            ParamTag::Float => 'f',
            ParamTag::Varchar => 'v',
            ParamTag::Decimal => 'D',
            ParamTag::NChar => 'n',
            ParamTag::NVarchar => 'N',
            ParamTag::LongByte => 'B',
            ParamTag::LongText => 'T',
            ParamTag::LongVarchar => 'V',
        }
    }
}

/// A host-level value, on either side of the marshaling boundary.
/// Serializable so the host binding can hand rows straight to its runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// One bind position: the Rust rendering of the host's flat
/// `(key?, type_tag, value)` triple. `name` is only meaningful for
/// stored-procedure parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub tag: ParamTag,
    pub value: Value,
}

impl Param {
    pub fn new(tag: ParamTag, value: impl Into<Value>) -> Param {
        Param { name: None, tag, value: value.into() }
    }

    pub fn named(name: impl Into<String>, tag: ParamTag, value: impl Into<Value>) -> Param {
        Param { name: Some(name.into()), tag, value: value.into() }
    }
}

/// Describes one result column, as produced by the transport for an executed
/// statement. Precision and scale are only meaningful for decimal columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub data_type: WireType,
    pub length: usize,
    pub precision: i16,
    pub scale: i16,
    pub nullable: bool,
    pub name: String,
}

/// Role of an outbound parameter in the statement being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// Positional query parameter.
    Query,
    /// Named stored-procedure parameter.
    Procedure,
    /// The synthetic leading parameter carrying the procedure name.
    Service,
}

/// Mirror of [`ColumnDescriptor`] for an outbound bind; built fresh for
/// every execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    pub data_type: WireType,
    pub length: usize,
    pub precision: i16,
    pub scale: i16,
    pub nullable: bool,
    pub role: ParamRole,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_type_id_roundtrip() {
        for id in 0..40i16 {
            let t = WireType::from_id(id);
            assert_eq!(t.id(), id, "id {} did not survive the round trip", id);
        }
    }

    #[test]
    fn tag_char_roundtrip() {
        for c in ['i', 'b', 'c', 'd', 't', 'f', 'v', 'D', 'n', 'N', 'B', 'T', 'V'] {
            let tag = ParamTag::from_char(c).expect("known tag");
            assert_eq!(tag.as_char(), c);
        }
        assert_eq!(ParamTag::from_char('x'), None);
    }

    #[test]
    fn labels_cover_the_vocabulary() {
        assert_eq!(type_label(WireType::Integer), "INTEGER");
        assert_eq!(type_label(WireType::Money), "DOUBLE");
        assert_eq!(type_label(WireType::LongByte), "LOB");
        assert_eq!(type_label(WireType::Timestamp), "DATE");
        assert_eq!(type_label(WireType::Unknown(99)), "UNMAPPED_DATATYPE");
    }

    #[test]
    fn value_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Value::Int(42),
            Value::Str("x".into()),
            Value::Null,
        ])
        .expect("serialize");
        assert_eq!(json, r#"[42,"x",null]"#);
    }
}
