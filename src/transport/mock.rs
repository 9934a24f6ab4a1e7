//! In-memory call-level engine
//! ---------------------------
//! A [`Transport`] implementation backed by a small table store, for this
//! crate's tests and for embedders who want to exercise a host binding
//! without a server. It keeps real protocol behavior where the driver
//! depends on it: implicit transaction acquisition, snapshot-based
//! savepoints, one live statement per session, segmented LOB transfer in
//! both directions, packed-decimal conversion and date rendering through
//! the format call. Wire encoding here is written independently of the
//! driver's codec so round-trip tests check two implementations against
//! each other.
//!
//! The SQL surface is deliberately tiny: single-table SELECT (projection
//! only, predicates ignored), INSERT .. VALUES with literals or bind
//! markers, and registered stored procedures.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::debug;

use super::{
    ColumnData, ConnectOptions, ConnectReply, DataFormat, DateFormat, Diagnostic, GetColumn,
    QueryInfo, QueryKind, QueryStarted, SavepointHandle, Severity, StmtHandle, TranHandle,
    Transport, TransportError, TransportResult,
};
use crate::types::{ColumnDescriptor, ParamDescriptor, ParamRole, WireType};

/// The catalog table every session can read.
pub const CATALOG_TABLE: &str = "ag_tables";

fn engine_error(sqlstate: &str, msg: impl Into<String>) -> TransportError {
    let message = msg.into();
    TransportError::with(
        message.clone(),
        vec![Diagnostic {
            severity: Severity::Error,
            sqlstate: sqlstate.to_string(),
            code: 0x10_0000,
            message,
        }],
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockValue {
    Null,
    Int(i64),
    Float(f64),
    Money(f64),
    Str(String),
    Bytes(Vec<u8>),
    Decimal(String),
    Date(NaiveDateTime),
}

#[derive(Debug, Clone)]
pub struct MockColumn {
    pub name: String,
    pub data_type: WireType,
    pub length: usize,
    pub precision: i16,
    pub scale: i16,
}

impl MockColumn {
    pub fn new(name: &str, data_type: WireType, length: usize) -> MockColumn {
        MockColumn { name: name.to_string(), data_type, length, precision: 0, scale: 0 }
    }

    pub fn decimal(name: &str, length: usize, precision: i16, scale: i16) -> MockColumn {
        MockColumn { name: name.to_string(), data_type: WireType::Decimal, length, precision, scale }
    }

    fn descriptor(&self) -> ColumnDescriptor {
        ColumnDescriptor {
            data_type: self.data_type,
            length: self.length,
            precision: self.precision,
            scale: self.scale,
            nullable: true,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct MockTable {
    columns: Vec<MockColumn>,
    rows: Vec<Vec<MockValue>>,
}

type Tables = BTreeMap<String, MockTable>;

#[derive(Debug, Clone)]
enum Literal {
    Placeholder,
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone)]
enum Plan {
    Select { table: String, columns: Vec<String> },
    Insert { table: String, columns: Vec<String>, values: Vec<Literal> },
    Procedure,
}

/// One encoded result cell, ready to serve.
#[derive(Debug, Clone)]
struct CellWire {
    data: Vec<u8>,
    null: bool,
    lob: bool,
}

#[derive(Debug)]
struct MockStatement {
    handle: u64,
    plan: Plan,
    param_descs: Vec<ParamDescriptor>,
    bound: Vec<(Option<String>, MockValue)>,
    pending: Vec<u8>,
    pending_active: bool,
    executed: bool,
    columns: Vec<ColumnDescriptor>,
    cells: Vec<CellWire>,
    cursor: usize,
    lob_offset: usize,
    rows_affected: i64,
}

impl MockStatement {
    fn new(handle: u64, plan: Plan) -> MockStatement {
        MockStatement {
            handle,
            plan,
            param_descs: Vec::new(),
            bound: Vec::new(),
            pending: Vec::new(),
            pending_active: false,
            executed: false,
            columns: Vec::new(),
            cells: Vec::new(),
            cursor: 0,
            lob_offset: 0,
            rows_affected: 0,
        }
    }
}

pub struct MockTransport {
    tables: Tables,
    tx_base: Option<Tables>,
    tran: Option<u64>,
    savepoints: Vec<(u64, Tables)>,
    stmt: Option<MockStatement>,
    procedures: BTreeMap<String, i64>,
    segment_size: usize,
    date_format: DateFormat,
    required_login: Option<(String, String)>,
    connected: bool,
    next_handle: u64,
    init_calls: usize,
    term_calls: usize,
    commit_calls: usize,
    put_calls: usize,
    proc_calls: Vec<(String, Vec<(Option<String>, MockValue)>)>,
}

impl Default for MockTransport {
    fn default() -> Self {
        MockTransport::new()
    }
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport {
            tables: Tables::new(),
            tx_base: None,
            tran: None,
            savepoints: Vec::new(),
            stmt: None,
            procedures: BTreeMap::new(),
            segment_size: 4096,
            date_format: DateFormat::Iso,
            required_login: None,
            connected: false,
            next_handle: 1,
            init_calls: 0,
            term_calls: 0,
            commit_calls: 0,
            put_calls: 0,
            proc_calls: Vec::new(),
        }
    }

    /// Negotiate a smaller LOB segment size (the default is 4096).
    pub fn with_segment_size(mut self, size: usize) -> Self {
        self.segment_size = size;
        self
    }

    pub fn with_table(
        mut self,
        name: &str,
        columns: Vec<MockColumn>,
        rows: Vec<Vec<MockValue>>,
    ) -> Self {
        self.tables.insert(name.to_ascii_lowercase(), MockTable { columns, rows });
        self
    }

    pub fn with_procedure(mut self, name: &str, rows_affected: i64) -> Self {
        self.procedures.insert(name.to_string(), rows_affected);
        self
    }

    /// Require these credentials at connect time.
    pub fn with_password(mut self, username: &str, password: &str) -> Self {
        self.required_login = Some((username.to_string(), password.to_string()));
        self
    }

    pub fn initialize_calls(&self) -> usize {
        self.init_calls
    }

    pub fn terminate_calls(&self) -> usize {
        self.term_calls
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls
    }

    pub fn procedure_calls(&self) -> &[(String, Vec<(Option<String>, MockValue)>)] {
        &self.proc_calls
    }

    /// Row count of a table as the store sees it right now (uncommitted
    /// changes included).
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .get(&table.to_ascii_lowercase())
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    fn alloc_handle(&mut self) -> u64 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn check_tran(&self, tran: TranHandle) -> TransportResult<()> {
        if self.tran == Some(tran.0) {
            Ok(())
        } else {
            Err(engine_error("25000", "invalid transaction handle"))
        }
    }

    fn statement_mut(&mut self, stmt: StmtHandle) -> TransportResult<&mut MockStatement> {
        match self.stmt.as_mut() {
            Some(st) if st.handle == stmt.0 => Ok(st),
            Some(_) => Err(engine_error("26000", "statement handle does not match")),
            None => Err(engine_error("26000", "no active statement")),
        }
    }

    fn ensure_executed(&mut self) -> TransportResult<()> {
        let already = self.stmt.as_ref().map(|s| s.executed).unwrap_or(true);
        if already {
            return Ok(());
        }
        let mut st = match self.stmt.take() {
            Some(st) => st,
            None => return Err(engine_error("26000", "no active statement")),
        };
        let result = self.execute_plan(&mut st);
        self.stmt = Some(st);
        result
    }

    fn execute_plan(&mut self, st: &mut MockStatement) -> TransportResult<()> {
        st.executed = true;
        match st.plan.clone() {
            Plan::Select { table, columns } => {
                let (descs, rows) = self.run_select(&table, &columns)?;
                st.rows_affected = rows.len() as i64;
                let mut cells = Vec::with_capacity(rows.len() * descs.len());
                for row in &rows {
                    for (desc, value) in descs.iter().zip(row) {
                        cells.push(encode_cell(desc, value)?);
                    }
                }
                st.columns = descs;
                st.cells = cells;
                Ok(())
            }
            Plan::Insert { table, columns, values } => {
                let mut bound = st.bound.iter().map(|(_, v)| v);
                let mut resolved = Vec::with_capacity(values.len());
                for lit in &values {
                    resolved.push(match lit {
                        Literal::Placeholder => bound
                            .next()
                            .cloned()
                            .ok_or_else(|| {
                                engine_error("07001", "fewer parameters than bind markers")
                            })?,
                        Literal::Null => MockValue::Null,
                        Literal::Int(i) => MockValue::Int(*i),
                        Literal::Float(f) => MockValue::Float(*f),
                        Literal::Str(s) => MockValue::Str(s.clone()),
                    });
                }
                let t = self
                    .tables
                    .get_mut(&table)
                    .ok_or_else(|| engine_error("42000", format!("table {} does not exist", table)))?;
                if columns.len() != resolved.len() {
                    return Err(engine_error("21000", "column/value count mismatch"));
                }
                let mut row = Vec::with_capacity(t.columns.len());
                for tc in &t.columns {
                    let v = columns
                        .iter()
                        .position(|c| c.eq_ignore_ascii_case(&tc.name))
                        .map(|i| resolved[i].clone())
                        .unwrap_or(MockValue::Null);
                    row.push(v);
                }
                t.rows.push(row);
                st.rows_affected = 1;
                Ok(())
            }
            Plan::Procedure => {
                let name = match st.bound.first() {
                    Some((_, MockValue::Str(s))) => s.clone(),
                    _ => {
                        return Err(engine_error(
                            "07005",
                            "procedure name parameter was not supplied",
                        ))
                    }
                };
                let rows = self.procedures.get(&name).copied().ok_or_else(|| {
                    engine_error("42000", format!("procedure {} does not exist", name))
                })?;
                self.proc_calls.push((name, st.bound[1..].to_vec()));
                st.rows_affected = rows;
                Ok(())
            }
        }
    }

    fn run_select(
        &self,
        table: &str,
        columns: &[String],
    ) -> TransportResult<(Vec<ColumnDescriptor>, Vec<Vec<MockValue>>)> {
        if table == CATALOG_TABLE {
            // The catalog exposes one varchar column of table names.
            let desc = ColumnDescriptor {
                data_type: WireType::Varchar,
                length: 34,
                precision: 0,
                scale: 0,
                nullable: false,
                name: "table_name".to_string(),
            };
            let rows = self
                .tables
                .keys()
                .map(|k| vec![MockValue::Str(k.clone())])
                .collect();
            return Ok((vec![desc], rows));
        }
        let t = self
            .tables
            .get(table)
            .ok_or_else(|| engine_error("42000", format!("table {} does not exist", table)))?;
        let indices: Vec<usize> = if columns.len() == 1 && columns[0] == "*" {
            (0..t.columns.len()).collect()
        } else {
            columns
                .iter()
                .map(|c| {
                    t.columns
                        .iter()
                        .position(|tc| tc.name.eq_ignore_ascii_case(c))
                        .ok_or_else(|| {
                            engine_error("42000", format!("column {} does not exist", c))
                        })
                })
                .collect::<TransportResult<_>>()?
        };
        let descs = indices.iter().map(|&i| t.columns[i].descriptor()).collect();
        let rows = t
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok((descs, rows))
    }

    fn render_date(&self, dt: NaiveDateTime) -> String {
        match self.date_format {
            DateFormat::Iso | DateFormat::Iso4 => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            DateFormat::Us => dt.format("%m/%d/%Y %H:%M:%S").to_string(),
            DateFormat::Multinational => dt.format("%d/%m/%Y %H:%M:%S").to_string(),
        }
    }
}

impl Transport for MockTransport {
    fn initialize(&mut self) -> TransportResult<()> {
        self.init_calls += 1;
        Ok(())
    }

    fn terminate(&mut self) -> TransportResult<()> {
        self.term_calls += 1;
        Ok(())
    }

    fn connect(
        &mut self,
        target: &str,
        username: &str,
        password: &str,
        _options: &ConnectOptions,
    ) -> TransportResult<ConnectReply> {
        if self.connected {
            return Err(engine_error("08002", "session is already connected"));
        }
        if target.is_empty() {
            return Err(engine_error("08001", "no target database supplied"));
        }
        if let Some((user, pass)) = &self.required_login {
            if username != user || password != pass {
                return Err(engine_error("28000", "authentication failed"));
            }
        }
        self.connected = true;
        debug!(target: "auriga::mock", db = %target, segment_size = self.segment_size, "session connected");
        Ok(ConnectReply { lob_segment_size: self.segment_size, api_level: 2 })
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        self.connected = false;
        self.stmt = None;
        self.tran = None;
        self.tx_base = None;
        self.savepoints.clear();
        Ok(())
    }

    fn set_date_format(&mut self, format: DateFormat) -> TransportResult<()> {
        self.date_format = format;
        Ok(())
    }

    fn query(
        &mut self,
        kind: QueryKind,
        text: Option<&str>,
        _with_params: bool,
        tran: Option<TranHandle>,
    ) -> TransportResult<QueryStarted> {
        if !self.connected {
            return Err(engine_error("08003", "not connected"));
        }
        if self.stmt.is_some() {
            return Err(engine_error("25001", "a statement is already active on this session"));
        }
        let tran_id = match tran {
            Some(h) => {
                self.check_tran(h)?;
                h.0
            }
            None => {
                if self.tran.is_some() {
                    return Err(engine_error("25000", "transaction already open on this session"));
                }
                // Implicit per-statement transaction.
                let h = self.alloc_handle();
                self.tx_base = Some(self.tables.clone());
                self.tran = Some(h);
                h
            }
        };
        let plan = match kind {
            QueryKind::ExecuteProcedure => Plan::Procedure,
            QueryKind::Query => {
                let text = text.ok_or_else(|| engine_error("42000", "missing query text"))?;
                parse_sql(text)?
            }
        };
        let handle = self.alloc_handle();
        debug!(target: "auriga::mock", handle, ?plan, "statement issued");
        self.stmt = Some(MockStatement::new(handle, plan));
        Ok(QueryStarted { stmt: StmtHandle(handle), tran: TranHandle(tran_id) })
    }

    fn set_descriptors(
        &mut self,
        stmt: StmtHandle,
        descriptors: &[ParamDescriptor],
    ) -> TransportResult<()> {
        let st = self.statement_mut(stmt)?;
        st.param_descs = descriptors.to_vec();
        Ok(())
    }

    fn put_param(
        &mut self,
        stmt: StmtHandle,
        more_segments: bool,
        null: bool,
        data: &[u8],
    ) -> TransportResult<()> {
        self.put_calls += 1;
        let st = self.statement_mut(stmt)?;
        let idx = st.bound.len();
        let desc = st
            .param_descs
            .get(idx)
            .cloned()
            .ok_or_else(|| engine_error("07002", "more parameter data than descriptors"))?;

        if null {
            st.bound.push((desc.name.clone(), MockValue::Null));
            return Ok(());
        }

        // Varchar-framed and long types carry their own two-byte segment
        // length prefix on every put.
        let prefixed = matches!(
            desc.data_type,
            WireType::Varchar | WireType::NVarchar | WireType::LongByte
        ) && desc.role != ParamRole::Service;
        let payload: Vec<u8> = if prefixed {
            if data.len() < 2 {
                return Err(engine_error("22000", "put shorter than its length prefix"));
            }
            data[2..].to_vec()
        } else {
            data.to_vec()
        };

        if more_segments {
            st.pending.extend_from_slice(&payload);
            st.pending_active = true;
            return Ok(());
        }
        let whole = if st.pending_active {
            st.pending.extend_from_slice(&payload);
            st.pending_active = false;
            std::mem::take(&mut st.pending)
        } else {
            payload
        };
        let value = decode_payload(&desc, &whole)?;
        st.bound.push((desc.name.clone(), value));
        Ok(())
    }

    fn get_descriptors(&mut self, stmt: StmtHandle) -> TransportResult<Vec<ColumnDescriptor>> {
        self.ensure_executed()?;
        let st = self.statement_mut(stmt)?;
        Ok(st.columns.clone())
    }

    fn get_column(&mut self, stmt: StmtHandle) -> TransportResult<GetColumn> {
        self.ensure_executed()?;
        let seg = self.segment_size;
        let st = self.statement_mut(stmt)?;
        if st.cursor >= st.cells.len() {
            return Ok(GetColumn::NoData);
        }
        let cell = &st.cells[st.cursor];
        if cell.lob && !cell.null {
            let remaining = cell.data.len() - st.lob_offset;
            let take = remaining.min(seg);
            let chunk = &cell.data[st.lob_offset..st.lob_offset + take];
            let more = st.lob_offset + take < cell.data.len();
            let mut data = Vec::with_capacity(take + 2);
            data.extend_from_slice(&(take as u16).to_le_bytes());
            data.extend_from_slice(chunk);
            if more {
                st.lob_offset += take;
            } else {
                st.lob_offset = 0;
                st.cursor += 1;
            }
            return Ok(GetColumn::Data(ColumnData { data, null: false, more_segments: more }));
        }
        let out = ColumnData { data: cell.data.clone(), null: cell.null, more_segments: false };
        st.cursor += 1;
        Ok(GetColumn::Data(out))
    }

    fn get_query_info(&mut self, stmt: StmtHandle) -> TransportResult<QueryInfo> {
        self.ensure_executed()?;
        let st = self.statement_mut(stmt)?;
        Ok(QueryInfo { rows_affected: st.rows_affected })
    }

    fn close(&mut self, stmt: StmtHandle) -> TransportResult<()> {
        self.statement_mut(stmt)?;
        self.stmt = None;
        Ok(())
    }

    fn commit(&mut self, tran: TranHandle) -> TransportResult<()> {
        self.check_tran(tran)?;
        self.commit_calls += 1;
        self.tx_base = None;
        self.savepoints.clear();
        self.tran = None;
        Ok(())
    }

    fn rollback(
        &mut self,
        tran: TranHandle,
        savepoint: Option<SavepointHandle>,
    ) -> TransportResult<()> {
        self.check_tran(tran)?;
        match savepoint {
            None => {
                let base = self
                    .tx_base
                    .take()
                    .ok_or_else(|| engine_error("25000", "no transaction snapshot"))?;
                self.tables = base;
                self.savepoints.clear();
                self.tran = None;
                Ok(())
            }
            Some(h) => {
                let idx = self
                    .savepoints
                    .iter()
                    .position(|(sp, _)| *sp == h.0)
                    .ok_or_else(|| engine_error("3B001", "invalid savepoint handle"))?;
                self.tables = self.savepoints[idx].1.clone();
                self.savepoints.truncate(idx + 1);
                Ok(())
            }
        }
    }

    fn savepoint(&mut self, tran: TranHandle, name: &str) -> TransportResult<SavepointHandle> {
        self.check_tran(tran)?;
        let h = self.alloc_handle();
        self.savepoints.push((h, self.tables.clone()));
        debug!(target: "auriga::mock", savepoint = name, handle = h, "savepoint created");
        Ok(SavepointHandle(h))
    }

    fn format_data(
        &mut self,
        src: &DataFormat,
        data: &[u8],
        dst: &DataFormat,
    ) -> TransportResult<Vec<u8>> {
        match (src.data_type, dst.data_type) {
            (WireType::Char, WireType::Decimal) => {
                let text = String::from_utf8_lossy(data);
                pack_decimal(text.trim(), dst.precision, dst.scale, dst.length)
            }
            (WireType::Decimal, WireType::Varchar) => {
                let s = unpack_decimal(data, src.precision, src.scale)?;
                let truncated = &s.as_bytes()[..s.len().min(dst.length.saturating_sub(2))];
                let mut out = Vec::with_capacity(truncated.len() + 2);
                out.extend_from_slice(&(truncated.len() as u16).to_le_bytes());
                out.extend_from_slice(truncated);
                Ok(out)
            }
            (t, WireType::Varchar) if t.is_temporal() => {
                let secs = i64::from_le_bytes(
                    data.try_into()
                        .map_err(|_| engine_error("22007", "temporal value is not 8 bytes"))?,
                );
                let dt = chrono::DateTime::from_timestamp(secs, 0)
                    .ok_or_else(|| engine_error("22007", "temporal value out of range"))?
                    .naive_utc();
                let s = self.render_date(dt);
                let mut out = Vec::with_capacity(s.len() + 2);
                out.extend_from_slice(&(s.len() as u16).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
                Ok(out)
            }
            (s, d) => Err(engine_error(
                "22000",
                format!("unsupported conversion {:?} -> {:?}", s, d),
            )),
        }
    }
}

fn parse_sql(text: &str) -> TransportResult<Plan> {
    let t = text.trim();
    let upper = t.to_ascii_uppercase();
    if upper.starts_with("SELECT") {
        let from = upper
            .find(" FROM ")
            .ok_or_else(|| engine_error("42000", "SELECT without FROM"))?;
        let columns: Vec<String> = t[6..from]
            .split(',')
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        if columns.is_empty() {
            return Err(engine_error("42000", "SELECT without a column list"));
        }
        let after = t[from + 6..].trim_start();
        let table = after
            .split_whitespace()
            .next()
            .ok_or_else(|| engine_error("42000", "SELECT without a table name"))?
            .to_ascii_lowercase();
        return Ok(Plan::Select { table, columns });
    }
    if upper.starts_with("INSERT") {
        let rest = t[6..].trim_start();
        let rest = if rest.len() >= 4 && rest.as_bytes()[..4].eq_ignore_ascii_case(b"INTO") {
            rest[4..].trim_start()
        } else {
            rest
        };
        let open = rest
            .find('(')
            .ok_or_else(|| engine_error("42000", "INSERT without a column list"))?;
        let table = rest[..open].trim().to_ascii_lowercase();
        let close = rest[open + 1..]
            .find(')')
            .ok_or_else(|| engine_error("42000", "unterminated column list"))?;
        let columns: Vec<String> = rest[open + 1..open + 1 + close]
            .split(',')
            .map(|c| c.trim().to_ascii_lowercase())
            .collect();
        let after = &rest[open + 1 + close + 1..];
        let vpos = after
            .to_ascii_uppercase()
            .find("VALUES")
            .ok_or_else(|| engine_error("42000", "INSERT without VALUES"))?;
        let vrest = &after[vpos + 6..];
        let vopen = vrest
            .find('(')
            .ok_or_else(|| engine_error("42000", "VALUES without a value list"))?;
        let vclose = vrest
            .rfind(')')
            .ok_or_else(|| engine_error("42000", "unterminated value list"))?;
        let values = split_values(&vrest[vopen + 1..vclose])
            .iter()
            .map(|v| parse_literal(v))
            .collect::<TransportResult<Vec<_>>>()?;
        return Ok(Plan::Insert { table, columns, values });
    }
    Err(engine_error(
        "42000",
        format!("mock engine cannot execute: {}", t),
    ))
}

/// Split a VALUES list on commas, respecting single-quoted literals.
fn split_values(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut in_quote = false;
    for ch in s.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                cur.push(ch);
            }
            ',' if !in_quote => {
                parts.push(cur.trim().to_string());
                cur.clear();
            }
            _ => cur.push(ch),
        }
    }
    if !cur.trim().is_empty() {
        parts.push(cur.trim().to_string());
    }
    parts
}

fn parse_literal(tok: &str) -> TransportResult<Literal> {
    if tok == crate::classify::PARAM_TOKEN {
        return Ok(Literal::Placeholder);
    }
    if tok.eq_ignore_ascii_case("NULL") {
        return Ok(Literal::Null);
    }
    if tok.len() >= 2 && tok.starts_with('\'') && tok.ends_with('\'') {
        return Ok(Literal::Str(tok[1..tok.len() - 1].to_string()));
    }
    if let Ok(i) = tok.parse::<i64>() {
        return Ok(Literal::Int(i));
    }
    if let Ok(f) = tok.parse::<f64>() {
        return Ok(Literal::Float(f));
    }
    Err(engine_error("42000", format!("cannot parse literal: {}", tok)))
}

fn decode_payload(desc: &ParamDescriptor, data: &[u8]) -> TransportResult<MockValue> {
    if desc.role == ParamRole::Service {
        return Ok(MockValue::Str(String::from_utf8_lossy(data).to_string()));
    }
    match desc.data_type {
        WireType::Integer => {
            let v = i64::from_le_bytes(
                data.try_into()
                    .map_err(|_| engine_error("22003", "integer parameter is not 8 bytes"))?,
            );
            Ok(MockValue::Int(v))
        }
        WireType::Float => {
            let v = f64::from_le_bytes(
                data.try_into()
                    .map_err(|_| engine_error("22003", "float parameter is not 8 bytes"))?,
            );
            Ok(MockValue::Float(v))
        }
        WireType::Char => Ok(MockValue::Str(String::from_utf8_lossy(data).to_string())),
        WireType::Varchar => Ok(MockValue::Str(String::from_utf8_lossy(data).to_string())),
        WireType::NChar | WireType::NVarchar => {
            let units: Vec<u16> = data
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16(&units)
                .map(MockValue::Str)
                .map_err(|_| engine_error("22021", "national parameter is not valid UTF-16"))
        }
        WireType::Decimal => {
            let s = unpack_decimal(data, desc.precision, desc.scale)?;
            Ok(MockValue::Decimal(s))
        }
        WireType::LongByte => Ok(MockValue::Bytes(data.to_vec())),
        other => Err(engine_error(
            "22000",
            format!("unsupported parameter wire type {:?}", other),
        )),
    }
}

fn encode_cell(desc: &ColumnDescriptor, value: &MockValue) -> TransportResult<CellWire> {
    if matches!(value, MockValue::Null) {
        return Ok(CellWire { data: Vec::new(), null: true, lob: desc.data_type.is_lob() });
    }
    let type_err = || {
        engine_error(
            "22000",
            format!("column {} cannot hold {:?}", desc.name, value),
        )
    };
    let data = match desc.data_type {
        WireType::Integer => {
            let v = match value {
                MockValue::Int(i) => *i,
                _ => return Err(type_err()),
            };
            match desc.length {
                1 => (v as i8).to_le_bytes().to_vec(),
                2 => (v as i16).to_le_bytes().to_vec(),
                4 => (v as i32).to_le_bytes().to_vec(),
                _ => v.to_le_bytes().to_vec(),
            }
        }
        WireType::Float => {
            let v = match value {
                MockValue::Float(f) => *f,
                MockValue::Int(i) => *i as f64,
                _ => return Err(type_err()),
            };
            match desc.length {
                4 => (v as f32).to_le_bytes().to_vec(),
                _ => v.to_le_bytes().to_vec(),
            }
        }
        WireType::Money => {
            let v = match value {
                MockValue::Money(m) | MockValue::Float(m) => *m,
                MockValue::Int(i) => *i as f64,
                _ => return Err(type_err()),
            };
            (v * 100.0).to_le_bytes().to_vec()
        }
        WireType::Char => {
            let s = match value {
                MockValue::Str(s) => s,
                _ => return Err(type_err()),
            };
            let mut bytes = s.as_bytes().to_vec();
            while bytes.len() < desc.length {
                bytes.push(b' ');
            }
            bytes
        }
        WireType::Varchar | WireType::Text => {
            let s = match value {
                MockValue::Str(s) => s,
                _ => return Err(type_err()),
            };
            let mut out = Vec::with_capacity(s.len() + 2);
            out.extend_from_slice(&(s.len() as u16).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
            out
        }
        WireType::Byte | WireType::VarByte | WireType::LogicalKey | WireType::TableKey => {
            let b = match value {
                MockValue::Bytes(b) => b,
                _ => return Err(type_err()),
            };
            let mut out = Vec::with_capacity(b.len() + 2);
            out.extend_from_slice(&(b.len() as u16).to_le_bytes());
            out.extend_from_slice(b);
            out
        }
        WireType::NChar => {
            let s = match value {
                MockValue::Str(s) => s,
                _ => return Err(type_err()),
            };
            let mut units: Vec<u16> = s.encode_utf16().collect();
            while units.len() * 2 < desc.length {
                units.push(b' ' as u16);
            }
            units.iter().flat_map(|u| u.to_le_bytes()).collect()
        }
        WireType::NVarchar => {
            let s = match value {
                MockValue::Str(s) => s,
                _ => return Err(type_err()),
            };
            let units: Vec<u16> = s.encode_utf16().collect();
            let mut out = Vec::with_capacity(2 + units.len() * 2);
            out.extend_from_slice(&(units.len() as u16).to_le_bytes());
            for u in units {
                out.extend_from_slice(&u.to_le_bytes());
            }
            out
        }
        WireType::Decimal => {
            let s = match value {
                MockValue::Decimal(s) | MockValue::Str(s) => s.clone(),
                MockValue::Int(i) => i.to_string(),
                _ => return Err(type_err()),
            };
            pack_decimal(&s, desc.precision, desc.scale, desc.length)?
        }
        WireType::Date
        | WireType::Time
        | WireType::Timestamp
        | WireType::IntervalYearMonth
        | WireType::IntervalDaySecond => {
            let dt = match value {
                MockValue::Date(dt) => *dt,
                MockValue::Str(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .map_err(|_| type_err())?,
                _ => return Err(type_err()),
            };
            dt.and_utc().timestamp().to_le_bytes().to_vec()
        }
        WireType::LongByte => match value {
            MockValue::Bytes(b) => b.clone(),
            _ => return Err(type_err()),
        },
        WireType::LongVarchar | WireType::LongText => match value {
            MockValue::Str(s) => s.as_bytes().to_vec(),
            _ => return Err(type_err()),
        },
        WireType::LongNVarchar => match value {
            MockValue::Str(s) => s
                .encode_utf16()
                .flat_map(|u| u.to_le_bytes())
                .collect(),
            _ => return Err(type_err()),
        },
        WireType::Unknown(_) => match value {
            MockValue::Str(s) => s.as_bytes().to_vec(),
            MockValue::Bytes(b) => b.clone(),
            _ => return Err(type_err()),
        },
    };
    Ok(CellWire { data, null: false, lob: desc.data_type.is_lob() })
}

/// Pack a decimal character string into signed packed-decimal nibbles:
/// `precision` digits then a sign nibble, zero-padded on the left to the
/// wire length.
fn pack_decimal(text: &str, precision: i16, scale: i16, out_len: usize) -> TransportResult<Vec<u8>> {
    let precision = precision as usize;
    let scale = scale as usize;
    let mut body = text;
    let mut negative = false;
    if let Some(rest) = body.strip_prefix('-') {
        negative = true;
        body = rest;
    } else if let Some(rest) = body.strip_prefix('+') {
        body = rest;
    }
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(engine_error("22018", format!("not a valid decimal: {}", text)));
    }
    let int_digits = int_part.trim_start_matches('0');
    if int_digits.len() > precision - scale {
        return Err(engine_error("22003", format!("decimal overflow: {}", text)));
    }

    let mut digits = Vec::with_capacity(precision);
    digits.resize(precision - scale - int_digits.len(), 0u8);
    digits.extend(int_digits.bytes().map(|b| b - b'0'));
    for i in 0..scale {
        digits.push(frac_part.as_bytes().get(i).map(|b| b - b'0').unwrap_or(0));
    }

    let mut nibbles = Vec::with_capacity(precision + 2);
    if (precision + 1) % 2 == 1 {
        nibbles.push(0u8);
    }
    nibbles.extend_from_slice(&digits);
    nibbles.push(if negative { 0x0D } else { 0x0C });

    let packed_len = nibbles.len() / 2;
    if packed_len > out_len {
        return Err(engine_error("22003", "packed decimal does not fit its buffer"));
    }
    let mut out = vec![0u8; out_len];
    for (i, pair) in nibbles.chunks(2).enumerate() {
        out[i] = (pair[0] << 4) | pair[1];
    }
    Ok(out)
}

/// Unpack packed-decimal bytes back into a character string, trimming
/// insignificant zeros.
fn unpack_decimal(data: &[u8], precision: i16, scale: i16) -> TransportResult<String> {
    let precision = precision as usize;
    let scale = scale as usize;
    let pad = (precision + 1) % 2;
    let need = (precision + 1 + pad) / 2;
    if data.len() < need {
        return Err(engine_error("22000", "packed decimal shorter than its precision"));
    }
    let mut nibbles = Vec::with_capacity(need * 2);
    for b in &data[..need] {
        nibbles.push(b >> 4);
        nibbles.push(b & 0x0F);
    }
    let digits = &nibbles[pad..pad + precision];
    if digits.iter().any(|&d| d > 9) {
        return Err(engine_error("22000", "invalid packed-decimal digit"));
    }
    let negative = nibbles[pad + precision] == 0x0D;

    let (int_digits, frac_digits) = digits.split_at(precision - scale);
    let int_str: String = int_digits.iter().map(|d| (d + b'0') as char).collect();
    let int_str = int_str.trim_start_matches('0');
    let int_str = if int_str.is_empty() { "0" } else { int_str };
    let frac_str: String = frac_digits.iter().map(|d| (d + b'0') as char).collect();
    let frac_str = frac_str.trim_end_matches('0');

    let mut out = String::new();
    if negative && !(int_str == "0" && frac_str.is_empty()) {
        out.push('-');
    }
    out.push_str(int_str);
    if !frac_str.is_empty() {
        out.push('.');
        out.push_str(frac_str);
    }
    Ok(out)
}
