//! Statement execution pipeline
//! ----------------------------
//! One submitted statement flows through: classification, dispatch to the
//! transaction operations or the generic path, placeholder rewriting,
//! descriptor and parameter binding, column-descriptor retrieval, row
//! fetching with LOB segment reassembly, rows-affected capture, guaranteed
//! statement close, and the autocommit commit.

use tracing::{debug, warn};

use crate::classify::{self, StatementKind};
use crate::codec;
use crate::connection::{Connection, QueryMetadata};
use crate::error::{DriverError, DriverResult};
use crate::transport::{GetColumn, QueryKind, StmtHandle, Transport};
use crate::types::{type_label, ColumnDescriptor, Param, ParamDescriptor, Value};

impl<T: Transport> Connection<T> {
    /// Execute one SQL statement with the given bind parameters and return
    /// the result set (empty for statements that produce none). Query
    /// metadata (column names, type names, byte sizes, rows affected)
    /// stays readable on the connection until the next execution.
    pub fn execute(&mut self, sql: &str, params: &[Param]) -> DriverResult<Vec<Vec<Value>>> {
        if !self.is_connected() {
            return Err(DriverError::state("not connected"));
        }
        let kind = classify::classify(sql);
        debug!(target: "auriga::exec", ?kind, "classified statement");

        match kind {
            StatementKind::Commit => {
                if self.in_transaction() {
                    self.commit_tx()?;
                } else {
                    warn!(target: "auriga::exec", "COMMIT with no active transaction; skipped");
                }
                Ok(Vec::new())
            }
            StatementKind::Rollback => {
                if self.in_transaction() {
                    self.rollback_tx(None)?;
                } else {
                    warn!(target: "auriga::exec", "ROLLBACK with no active transaction; skipped");
                }
                Ok(Vec::new())
            }
            StatementKind::RollbackTo | StatementKind::RollbackWorkTo => {
                if !self.in_transaction() {
                    return Err(DriverError::state(
                        "unable to rollback a non-existent transaction",
                    ));
                }
                let name = classify::savepoint_name(kind, sql)?;
                self.rollback(Some(&name))?;
                Ok(Vec::new())
            }
            StatementKind::Savepoint => {
                if !self.in_transaction() {
                    return Err(DriverError::state(
                        "unable to create a savepoint with no active transaction",
                    ));
                }
                let name = classify::savepoint_name(kind, sql)?;
                self.savepoint(&name)?;
                Ok(Vec::new())
            }
            StatementKind::StartTransaction => {
                self.start_transaction()?;
                Ok(Vec::new())
            }
            StatementKind::Connect => {
                warn!(target: "auriga::exec", "CONNECT is not executable SQL here; use the dedicated connect API");
                Ok(Vec::new())
            }
            StatementKind::Disconnect => {
                warn!(target: "auriga::exec", "DISCONNECT is not executable SQL here; use the dedicated disconnect API");
                Ok(Vec::new())
            }
            StatementKind::SetAutocommit => {
                warn!(target: "auriga::exec", "SET AUTOCOMMIT is not executable SQL here; use the dedicated API");
                Ok(Vec::new())
            }
            StatementKind::GetDbEvent => {
                warn!(target: "auriga::exec", "GET DBEVENT is not supported");
                Ok(Vec::new())
            }
            StatementKind::Copy => {
                warn!(target: "auriga::exec", "COPY is not supported");
                Ok(Vec::new())
            }
            _ => self.execute_generic(sql, params),
        }
    }

    fn execute_generic(&mut self, sql: &str, params: &[Param]) -> DriverResult<Vec<Vec<Value>>> {
        let procedure = classify::procedure_name(sql)?;

        // Everything detectable in advance fails before wire traffic:
        // placeholder arity, parameter naming, tag/value mismatches.
        let statement;
        let query_kind;
        match &procedure {
            None => {
                let (rewritten, placeholders) = classify::rewrite_placeholders(sql);
                if params.len() != placeholders {
                    return Err(DriverError::malformed(format!(
                        "statement has {} placeholder(s) but {} parameter(s) were supplied",
                        placeholders,
                        params.len()
                    )));
                }
                statement = Some(rewritten);
                query_kind = QueryKind::Query;
            }
            Some(name) => {
                debug!(target: "auriga::exec", procedure = %name, "stored-procedure call");
                statement = None;
                query_kind = QueryKind::ExecuteProcedure;
            }
        }

        let mut descriptors: Vec<ParamDescriptor> = Vec::with_capacity(params.len() + 1);
        if let Some(name) = &procedure {
            descriptors.push(codec::procedure_name_descriptor(name));
        }
        for p in params {
            descriptors.push(codec::param_descriptor(p, procedure.is_some(), self.lob_segment_size)?);
        }

        let with_params = !descriptors.is_empty();
        let started = self.transport.query(
            query_kind,
            statement.as_deref(),
            with_params,
            self.tran,
        )?;
        self.stmt = Some(started.stmt);
        if self.tran.is_none() {
            // First statement after connect or commit implicitly opens its
            // own transaction; adopt the handle.
            self.tran = Some(started.tran);
        }

        let fetched = self.run_statement(started.stmt, &descriptors, params, procedure.as_deref());
        let closed = self.close_statement();
        let rows = fetched?;
        closed?;

        if self.autocommit {
            self.commit_tx()?;
        }
        Ok(rows)
    }

    fn run_statement(
        &mut self,
        stmt: StmtHandle,
        descriptors: &[ParamDescriptor],
        params: &[Param],
        procedure: Option<&str>,
    ) -> DriverResult<Vec<Vec<Value>>> {
        if !descriptors.is_empty() {
            self.transport.set_descriptors(stmt, descriptors)?;
            if let Some(name) = procedure {
                self.transport.put_param(stmt, false, false, name.as_bytes())?;
            }
            for p in params {
                let puts = codec::encode_param(&mut self.transport, p, self.lob_segment_size)?;
                for put in puts {
                    self.transport.put_param(stmt, put.more_segments, put.null, &put.data)?;
                }
            }
        }

        let columns = self.transport.get_descriptors(stmt)?;
        let mut meta = QueryMetadata::default();
        let mut rows: Vec<Vec<Value>> = Vec::new();

        if !columns.is_empty() {
            meta.column_names = columns.iter().map(|c| c.name.clone()).collect();
            meta.data_types = columns.iter().map(|c| type_label(c.data_type)).collect();
            meta.data_sizes = vec![0; columns.len()];

            'rows: loop {
                let mut row = Vec::with_capacity(columns.len());
                for (i, col) in columns.iter().enumerate() {
                    match self.fetch_column(stmt, col)? {
                        None => break 'rows,
                        Some((data, null)) => {
                            meta.data_sizes[i] = data.len();
                            let value = if null {
                                Value::Null
                            } else {
                                codec::decode_column(
                                    &mut self.transport,
                                    col,
                                    &data,
                                    &mut meta.diagnostics,
                                )?
                            };
                            row.push(value);
                        }
                    }
                }
                rows.push(row);
            }
            debug!(target: "auriga::exec", rows = rows.len(), columns = columns.len(), "result set fetched");
        }

        self.last_rows_affected = self.transport.get_query_info(stmt)?.rows_affected;
        self.meta = meta;
        Ok(rows)
    }

    /// Pull one column's data, reassembling segmented large objects. Each
    /// segment's first two bytes are its own length prefix; payloads are
    /// accumulated until the transport clears the continuation flag.
    fn fetch_column(
        &mut self,
        stmt: StmtHandle,
        col: &ColumnDescriptor,
    ) -> DriverResult<Option<(Vec<u8>, bool)>> {
        let mut assembled: Option<Vec<u8>> = None;
        loop {
            match self.transport.get_column(stmt)? {
                GetColumn::NoData => return Ok(None),
                GetColumn::Data(cd) => {
                    let segmented =
                        col.data_type.is_lob() || cd.more_segments || assembled.is_some();
                    if segmented && !(cd.null && cd.data.is_empty()) {
                        if cd.data.len() < 2 {
                            return Err(DriverError::decode(format!(
                                "segment for column '{}' shorter than its length prefix",
                                col.name
                            )));
                        }
                        let seg_len = u16::from_le_bytes([cd.data[0], cd.data[1]]) as usize;
                        if 2 + seg_len > cd.data.len() {
                            return Err(DriverError::decode(format!(
                                "segment length {} exceeds received data for column '{}'",
                                seg_len, col.name
                            )));
                        }
                        let buf = assembled.get_or_insert_with(Vec::new);
                        buf.extend_from_slice(&cd.data[2..2 + seg_len]);
                        if cd.more_segments {
                            continue;
                        }
                        let data = assembled.take().unwrap_or_default();
                        return Ok(Some((data, cd.null)));
                    }
                    return Ok(Some((cd.data, cd.null)));
                }
            }
        }
    }

    /// Close the live statement handle, if any. Runs on every exit path of
    /// the generic execution, error paths included.
    fn close_statement(&mut self) -> DriverResult<()> {
        if let Some(stmt) = self.stmt.take() {
            self.transport.close(stmt)?;
        }
        Ok(())
    }
}
