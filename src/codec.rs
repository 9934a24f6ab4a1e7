//! Wire value codec
//! ----------------
//! Encode host values into the transport's length-prefixed binary format
//! and decode received column data back into host values. Integers and
//! floats travel as native little-endian scalars, variable-length character
//! data carries a two-byte length prefix, national types are transcoded to
//! UTF-16, decimals and date/time values go through the transport's
//! format-conversion call, and large objects are segmented to the session's
//! negotiated segment size.

use tracing::debug;

use crate::error::{DriverError, DriverResult};
use crate::transport::{DataFormat, Transport};
use crate::types::{
    Param, ParamDescriptor, ParamRole, ParamTag, Value, WireType, ColumnDescriptor,
    DATE_TEXT_LEN, DECIMAL_PRECISION, DECIMAL_SCALE, DECIMAL_TEXT_LEN, DECIMAL_WIRE_LEN,
    FLOAT_PRECISION, FLOAT_SCALE,
};
use crate::unicode;

/// One put-parameter call: a segment of (or the whole of) a bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct WirePut {
    pub more_segments: bool,
    pub null: bool,
    pub data: Vec<u8>,
}

impl WirePut {
    fn whole(data: Vec<u8>) -> WirePut {
        WirePut { more_segments: false, null: false, data }
    }
}

fn value_bytes<'a>(param: &'a Param) -> DriverResult<&'a [u8]> {
    match &param.value {
        Value::Str(s) => Ok(s.as_bytes()),
        Value::Bytes(b) => Ok(b.as_slice()),
        other => Err(DriverError::encode(format!(
            "parameter tagged '{}' requires a string value, got {:?}",
            param.tag.as_char(),
            other
        ))),
    }
}

fn utf16_bytes(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.len() * 2);
    for u in units {
        out.extend_from_slice(&u.to_le_bytes());
    }
    out
}

fn len_prefixed(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Build the outbound descriptor for one parameter. Fails on tag/value
/// mismatches before any wire traffic is sent.
pub fn param_descriptor(
    param: &Param,
    is_procedure_call: bool,
    seg_size: usize,
) -> DriverResult<ParamDescriptor> {
    let (role, name) = if is_procedure_call {
        let name = param.name.clone().ok_or_else(|| {
            DriverError::malformed("stored-procedure parameters must be named")
        })?;
        (ParamRole::Procedure, Some(name))
    } else {
        (ParamRole::Query, None)
    };

    let nullable = param.value.is_null();
    let (data_type, length, precision, scale) = match param.tag {
        ParamTag::LongByte => {
            require_string_or_null(param)?;
            (WireType::LongByte, seg_size, 0, 0)
        }
        ParamTag::LongText | ParamTag::LongVarchar => {
            // Long character values are described segment-sized as varchar;
            // the put path carries the segmentation.
            require_string_or_null(param)?;
            (WireType::Varchar, seg_size, 0, 0)
        }
        ParamTag::Byte | ParamTag::Char | ParamTag::Date | ParamTag::Text => {
            let len = if nullable { 0 } else { value_bytes(param)?.len() };
            (WireType::Char, len, 0, 0)
        }
        ParamTag::Varchar => {
            let len = if nullable { 0 } else { value_bytes(param)?.len() };
            (WireType::Varchar, len + 2, 0, 0)
        }
        ParamTag::Decimal => {
            require_string_or_null(param)?;
            (WireType::Decimal, DECIMAL_WIRE_LEN, DECIMAL_PRECISION, DECIMAL_SCALE)
        }
        ParamTag::Float => {
            match param.value {
                Value::Float(_) | Value::Null => {}
                _ => {
                    return Err(DriverError::encode(format!(
                        "parameter tagged 'f' requires a float value, got {:?}",
                        param.value
                    )))
                }
            }
            (WireType::Float, 8, FLOAT_PRECISION, FLOAT_SCALE)
        }
        ParamTag::Integer => {
            match param.value {
                Value::Int(_) | Value::Null => {}
                _ => {
                    return Err(DriverError::encode(format!(
                        "parameter tagged 'i' requires an integer value, got {:?}",
                        param.value
                    )))
                }
            }
            (WireType::Integer, 8, 0, 0)
        }
        ParamTag::NChar => {
            let len = if nullable {
                0
            } else {
                let units = unicode::utf8_to_utf16_vec(value_bytes(param)?)?;
                units.len() * 2
            };
            (WireType::NChar, len, 0, 0)
        }
        ParamTag::NVarchar => {
            let len = if nullable {
                0
            } else {
                let units = unicode::utf8_to_utf16_vec(value_bytes(param)?)?;
                units.len() * 2
            };
            (WireType::NVarchar, len + 2, 0, 0)
        }
    };

    Ok(ParamDescriptor { data_type, length, precision, scale, nullable, role, name })
}

fn require_string_or_null(param: &Param) -> DriverResult<()> {
    match param.value {
        Value::Str(_) | Value::Bytes(_) | Value::Null => Ok(()),
        _ => Err(DriverError::encode(format!(
            "parameter tagged '{}' requires a string value, got {:?}",
            param.tag.as_char(),
            param.value
        ))),
    }
}

/// The synthetic leading descriptor carrying a procedure name.
pub fn procedure_name_descriptor(name: &str) -> ParamDescriptor {
    ParamDescriptor {
        data_type: WireType::Char,
        length: name.len(),
        precision: 0,
        scale: 0,
        nullable: false,
        role: ParamRole::Service,
        name: None,
    }
}

/// Encode one parameter into its put-call sequence. Dispatch considers the
/// host value's native type first: integers and floats always travel as
/// native scalars, nil always takes the null path, strings go by tag.
pub fn encode_param<T: Transport>(
    transport: &mut T,
    param: &Param,
    seg_size: usize,
) -> DriverResult<Vec<WirePut>> {
    match &param.value {
        Value::Null => Ok(vec![WirePut { more_segments: false, null: true, data: Vec::new() }]),
        Value::Int(v) => Ok(vec![WirePut::whole(v.to_le_bytes().to_vec())]),
        Value::Float(v) => Ok(vec![WirePut::whole(v.to_le_bytes().to_vec())]),
        Value::Str(_) | Value::Bytes(_) => {
            let bytes = value_bytes(param)?;
            match param.tag {
                ParamTag::NVarchar => {
                    let units = unicode::utf8_to_utf16_vec(bytes)?;
                    // Two-byte prefix counts UTF-16 units, not bytes.
                    let mut data = Vec::with_capacity(2 + units.len() * 2);
                    data.extend_from_slice(&(units.len() as u16).to_le_bytes());
                    data.extend_from_slice(&utf16_bytes(&units));
                    Ok(vec![WirePut::whole(data)])
                }
                ParamTag::NChar => {
                    let units = unicode::utf8_to_utf16_vec(bytes)?;
                    Ok(vec![WirePut::whole(utf16_bytes(&units))])
                }
                ParamTag::Varchar => Ok(vec![WirePut::whole(len_prefixed(bytes))]),
                ParamTag::Decimal => {
                    let src = DataFormat::plain(WireType::Char, bytes.len());
                    let dst = DataFormat {
                        data_type: WireType::Decimal,
                        length: DECIMAL_WIRE_LEN,
                        precision: DECIMAL_PRECISION,
                        scale: DECIMAL_SCALE,
                    };
                    let packed = transport.format_data(&src, bytes, &dst)?;
                    Ok(vec![WirePut::whole(packed)])
                }
                ParamTag::LongByte | ParamTag::LongText | ParamTag::LongVarchar => {
                    Ok(segment_lob(bytes, seg_size))
                }
                ParamTag::Integer
                | ParamTag::Byte
                | ParamTag::Char
                | ParamTag::Date
                | ParamTag::Text
                | ParamTag::Float => Ok(vec![WirePut::whole(bytes.to_vec())]),
            }
        }
    }
}

/// Split a LOB value into put segments no larger than the negotiated
/// segment size, each carrying its own two-byte length prefix; all but the
/// last are flagged "more segments follow".
fn segment_lob(bytes: &[u8], seg_size: usize) -> Vec<WirePut> {
    debug_assert!(seg_size > 0);
    if bytes.is_empty() {
        return vec![WirePut::whole(len_prefixed(bytes))];
    }
    let mut puts = Vec::with_capacity(bytes.len() / seg_size + 1);
    let mut rest = bytes;
    while !rest.is_empty() {
        let take = rest.len().min(seg_size);
        let (seg, tail) = rest.split_at(take);
        puts.push(WirePut {
            more_segments: !tail.is_empty(),
            null: false,
            data: len_prefixed(seg),
        });
        rest = tail;
    }
    puts
}

fn strip_len_prefix(data: &[u8]) -> DriverResult<&[u8]> {
    if data.len() < 2 {
        return Err(DriverError::decode(format!(
            "length-prefixed value too short ({} bytes)",
            data.len()
        )));
    }
    Ok(&data[2..])
}

fn utf16_units(data: &[u8]) -> DriverResult<Vec<u16>> {
    if data.len() % 2 != 0 {
        return Err(DriverError::decode(format!(
            "national value has odd byte length {}",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect())
}

fn utf16_to_string(data: &[u8]) -> DriverResult<String> {
    let units = utf16_units(data)?;
    let bytes = unicode::utf16_to_utf8_vec(&units);
    String::from_utf8(bytes)
        .map_err(|e| DriverError::decode(format!("national value is not valid UTF-8: {}", e)))
}

fn trimmed_char(bytes: &[u8]) -> Value {
    let s = String::from_utf8_lossy(bytes);
    Value::Str(s.trim_end().to_string())
}

fn string_via_convert<T: Transport>(
    transport: &mut T,
    src: DataFormat,
    data: &[u8],
    dst_len: usize,
) -> DriverResult<Value> {
    let dst = DataFormat::plain(WireType::Varchar, dst_len);
    let converted = transport.format_data(&src, data, &dst)?;
    // The conversion yields a varchar: a two-byte length header, then text.
    if converted.len() < 2 {
        return Err(DriverError::decode("conversion result shorter than its header"));
    }
    let len = u16::from_le_bytes([converted[0], converted[1]]) as usize;
    let end = (2 + len).min(converted.len());
    Ok(Value::Str(String::from_utf8_lossy(&converted[2..end]).to_string()))
}

/// Decode one column's received bytes into a host value. `data` is the raw
/// wire buffer for scalar columns, or the fully reassembled payload for
/// segmented LOB columns (segment prefixes already consumed).
pub fn decode_column<T: Transport>(
    transport: &mut T,
    desc: &ColumnDescriptor,
    data: &[u8],
    diagnostics: &mut Vec<String>,
) -> DriverResult<Value> {
    match desc.data_type {
        WireType::Integer => match data.len() {
            1 => Ok(Value::Int(i8::from_le_bytes([data[0]]) as i64)),
            2 => Ok(Value::Int(i16::from_le_bytes([data[0], data[1]]) as i64)),
            4 => Ok(Value::Int(i32::from_le_bytes(data.try_into().map_err(bad_len)?) as i64)),
            8 => Ok(Value::Int(i64::from_le_bytes(data.try_into().map_err(bad_len)?))),
            n => {
                diagnostics.push(format!("integer column '{}' has invalid length {}", desc.name, n));
                Ok(Value::Null)
            }
        },
        WireType::Float => match data.len() {
            4 => Ok(Value::Float(f32::from_le_bytes(data.try_into().map_err(bad_len)?) as f64)),
            8 => Ok(Value::Float(f64::from_le_bytes(data.try_into().map_err(bad_len)?))),
            n => {
                diagnostics.push(format!("float column '{}' has invalid length {}", desc.name, n));
                Ok(Value::Null)
            }
        },
        WireType::Money => {
            // Stored as an 8-byte fixed-point cents equivalent.
            let cents = f64::from_le_bytes(
                data.try_into()
                    .map_err(|_| DriverError::decode("money column is not 8 bytes"))?,
            );
            Ok(Value::Float(cents / 100.0))
        }
        WireType::Decimal => {
            let src = DataFormat {
                data_type: WireType::Decimal,
                length: desc.length,
                precision: desc.precision,
                scale: desc.scale,
            };
            string_via_convert(transport, src, data, DECIMAL_TEXT_LEN)
        }
        WireType::Date
        | WireType::Time
        | WireType::Timestamp
        | WireType::IntervalYearMonth
        | WireType::IntervalDaySecond => {
            let src = DataFormat::plain(desc.data_type, data.len());
            string_via_convert(transport, src, data, DATE_TEXT_LEN)
        }
        WireType::Char => Ok(trimmed_char(data)),
        WireType::NChar => {
            let s = utf16_to_string(data)?;
            Ok(Value::Str(s.trim_end().to_string()))
        }
        WireType::NVarchar => Ok(Value::Str(utf16_to_string(strip_len_prefix(data)?)?)),
        WireType::Varchar | WireType::Text => Ok(Value::Str(
            String::from_utf8_lossy(strip_len_prefix(data)?).to_string(),
        )),
        WireType::Byte | WireType::VarByte | WireType::LogicalKey | WireType::TableKey => {
            Ok(Value::Bytes(strip_len_prefix(data)?.to_vec()))
        }
        WireType::LongByte => Ok(Value::Bytes(data.to_vec())),
        WireType::LongVarchar | WireType::LongText => {
            Ok(Value::Str(String::from_utf8_lossy(data).to_string()))
        }
        WireType::LongNVarchar => Ok(Value::Str(utf16_to_string(data)?)),
        WireType::Unknown(id) => {
            debug!(target: "auriga::codec", id, column = %desc.name, "unmapped wire type, decoding as char");
            diagnostics.push(format!(
                "column '{}' has unmapped wire type {}, decoded as char",
                desc.name, id
            ));
            Ok(trimmed_char(data))
        }
    }
}

fn bad_len(_: std::array::TryFromSliceError) -> DriverError {
    DriverError::decode("scalar column length mismatch")
}
