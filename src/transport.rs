//! Vendor call-level transport boundary
//! ------------------------------------
//! The driver talks to the database through this trait, one method per
//! call-level entry point. The vendor interface is natively asynchronous
//! (issue call, wait for completion, check status, drain the error-info
//! loop); implementations collapse that to blocking methods here, waiting
//! forever by default or honoring the optional wait timeout from
//! [`ConnectOptions`]. Every error carries the full drained diagnostic list.
//!
//! There is no cancellation: a blocked call cannot be aborted from another
//! thread. Callers serialize statements themselves; only one statement
//! handle is live per session at a time.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::types::{ColumnDescriptor, ParamDescriptor, WireType};

pub mod mock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Message,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Message => "USER MESSAGE",
        }
    }
}

/// One entry from the transport's error-info loop. Several may accompany a
/// single failed call.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub sqlstate: String,
    pub code: i32,
    pub message: String,
}

/// A failed transport call, with every diagnostic drained from the
/// error-info loop. `Display` reports them all, not just the first.
#[derive(Debug, Clone)]
pub struct TransportError {
    pub message: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl TransportError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        TransportError { message: message.into(), diagnostics: Vec::new() }
    }

    pub fn with<S: Into<String>>(message: S, diagnostics: Vec<Diagnostic>) -> Self {
        TransportError { message: message.into(), diagnostics }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        for d in &self.diagnostics {
            write!(
                f,
                "\n{}: SQLSTATE: {}, CODE: {:#x}: {}",
                d.severity.as_str(),
                d.sqlstate,
                d.code,
                d.message
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for TransportError {}

pub type TransportResult<T> = Result<T, TransportError>;

/// Opaque transaction handle assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TranHandle(pub u64);

/// Opaque statement handle assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtHandle(pub u64);

/// Opaque savepoint handle assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SavepointHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Ordinary SQL text (SELECT, DML, DDL).
    Query,
    /// Stored-procedure invocation; the procedure name travels as the
    /// leading service parameter instead of as query text.
    ExecuteProcedure,
}

/// Session-wide rendering of date/time values fetched as character data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Iso,
    Iso4,
    Us,
    Multinational,
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// How long to wait on each call's completion. `None` waits forever.
    pub timeout: Option<Duration>,
    pub date_format: DateFormat,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions { timeout: None, date_format: DateFormat::Iso }
    }
}

/// Session parameters negotiated at connect time.
#[derive(Debug, Clone)]
pub struct ConnectReply {
    /// Maximum LOB segment size the session will accept per put/get call.
    pub lob_segment_size: usize,
    /// Protocol level spoken by the server.
    pub api_level: u32,
}

/// Result of issuing a statement: the statement handle plus the transaction
/// handle it ran under. When no transaction was supplied the transport
/// implicitly acquires one and returns it here.
#[derive(Debug, Clone, Copy)]
pub struct QueryStarted {
    pub stmt: StmtHandle,
    pub tran: TranHandle,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryInfo {
    pub rows_affected: i64,
}

/// One column's worth of data from a get-column call. For large objects
/// this is a single segment and `more_segments` signals continuation.
#[derive(Debug, Clone)]
pub struct ColumnData {
    pub data: Vec<u8>,
    pub null: bool,
    pub more_segments: bool,
}

#[derive(Debug, Clone)]
pub enum GetColumn {
    Data(ColumnData),
    NoData,
}

/// Source or destination shape for the format-conversion call (packed
/// decimal and date/time rendering).
#[derive(Debug, Clone)]
pub struct DataFormat {
    pub data_type: WireType,
    pub length: usize,
    pub precision: i16,
    pub scale: i16,
}

impl DataFormat {
    pub fn plain(data_type: WireType, length: usize) -> DataFormat {
        DataFormat { data_type, length, precision: 0, scale: 0 }
    }
}

/// The vendor call-level interface. All methods block until the underlying
/// call completes; implementations own the initialize/terminate lifecycle
/// of whatever process-wide state the vendor library needs.
pub trait Transport {
    fn initialize(&mut self) -> TransportResult<()>;
    fn terminate(&mut self) -> TransportResult<()>;

    fn connect(
        &mut self,
        target: &str,
        username: &str,
        password: &str,
        options: &ConnectOptions,
    ) -> TransportResult<ConnectReply>;
    fn disconnect(&mut self) -> TransportResult<()>;

    fn set_date_format(&mut self, format: DateFormat) -> TransportResult<()>;

    /// Issue a statement. `text` is `None` for procedure execution.
    /// `with_params` announces that descriptors and parameter data follow
    /// before results may be fetched.
    fn query(
        &mut self,
        kind: QueryKind,
        text: Option<&str>,
        with_params: bool,
        tran: Option<TranHandle>,
    ) -> TransportResult<QueryStarted>;

    fn set_descriptors(
        &mut self,
        stmt: StmtHandle,
        descriptors: &[ParamDescriptor],
    ) -> TransportResult<()>;

    /// Send one parameter data value, or one segment of a segmented value.
    fn put_param(
        &mut self,
        stmt: StmtHandle,
        more_segments: bool,
        null: bool,
        data: &[u8],
    ) -> TransportResult<()>;

    fn get_descriptors(&mut self, stmt: StmtHandle) -> TransportResult<Vec<ColumnDescriptor>>;

    /// Fetch the next column's data, one column (or one LOB segment) per
    /// call, in row-major order.
    fn get_column(&mut self, stmt: StmtHandle) -> TransportResult<GetColumn>;

    fn get_query_info(&mut self, stmt: StmtHandle) -> TransportResult<QueryInfo>;
    fn close(&mut self, stmt: StmtHandle) -> TransportResult<()>;

    fn commit(&mut self, tran: TranHandle) -> TransportResult<()>;
    fn rollback(
        &mut self,
        tran: TranHandle,
        savepoint: Option<SavepointHandle>,
    ) -> TransportResult<()>;
    fn savepoint(&mut self, tran: TranHandle, name: &str) -> TransportResult<SavepointHandle>;

    /// Convert a value between wire representations (character string to
    /// packed decimal, packed decimal or date/time to character string).
    fn format_data(
        &mut self,
        src: &DataFormat,
        data: &[u8],
        dst: &DataFormat,
    ) -> TransportResult<Vec<u8>>;
}
