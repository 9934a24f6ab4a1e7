//! Session and transaction state machine
//! -------------------------------------
//! A [`Connection`] owns one transport session: the connection itself, the
//! optional active transaction and statement handles, the autocommit flag,
//! and the ordered savepoint chain. It is the unit of exclusive ownership:
//! all methods take `&mut self`, no internal locking, one statement live at
//! a time. Independent connections are independent values.

use tracing::debug;

use crate::error::{DriverError, DriverResult};
use crate::transport::{
    ConnectOptions, DateFormat, SavepointHandle, StmtHandle, TranHandle, Transport,
    TransportError,
};
use crate::types::Value;

/// Lightweight catalog probe used to coax a transaction handle out of the
/// transport when an explicit transaction is started.
pub(crate) const TRAN_PROBE_SQL: &str =
    "SELECT table_name FROM ag_tables WHERE table_name = 'ag_tables'";

/// Catalog query backing [`Connection::tables`].
const TABLES_SQL: &str =
    "SELECT table_name FROM ag_tables WHERE table_type = 'T' AND table_name NOT LIKE 'ag_%'";

#[derive(Debug, Clone)]
pub struct SavepointEntry {
    pub name: String,
    pub(crate) handle: SavepointHandle,
}

/// Metadata retained from the last execution until the next one overwrites
/// it.
#[derive(Debug, Clone, Default)]
pub struct QueryMetadata {
    pub column_names: Vec<String>,
    pub data_types: Vec<&'static str>,
    pub data_sizes: Vec<usize>,
    /// Non-fatal decode notes (e.g. unmapped wire types).
    pub diagnostics: Vec<String>,
}

pub struct Connection<T: Transport> {
    pub(crate) transport: T,
    connected: bool,
    pub(crate) tran: Option<TranHandle>,
    pub(crate) stmt: Option<StmtHandle>,
    pub(crate) autocommit: bool,
    pub(crate) lob_segment_size: usize,
    api_level: u32,
    current_database: Option<String>,
    savepoints: Vec<SavepointEntry>,
    pub(crate) meta: QueryMetadata,
    pub(crate) last_rows_affected: i64,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T) -> Connection<T> {
        Connection {
            transport,
            connected: false,
            tran: None,
            stmt: None,
            autocommit: true,
            lob_segment_size: 0,
            api_level: 0,
            current_database: None,
            savepoints: Vec::new(),
            meta: QueryMetadata::default(),
            last_rows_affected: 0,
        }
    }

    /// Connect to `target`. A username may be supplied with a password;
    /// a username alone is rejected before any wire traffic.
    pub fn connect(
        &mut self,
        target: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> DriverResult<()> {
        self.connect_with_options(target, username, password, &ConnectOptions::default())
    }

    pub fn connect_with_options(
        &mut self,
        target: &str,
        username: Option<&str>,
        password: Option<&str>,
        options: &ConnectOptions,
    ) -> DriverResult<()> {
        if self.connected {
            return Err(DriverError::state("already connected; disconnect first"));
        }
        if username.is_some() && password.is_none() {
            return Err(DriverError::malformed(
                "a password is required when a username is supplied",
            ));
        }
        let user = username.unwrap_or("");
        let pass = password.unwrap_or("");

        self.transport.initialize()?;
        // Credentials never appear in the error text: name the target and
        // user only.
        let reply = self
            .transport
            .connect(target, user, pass, options)
            .map_err(|e| {
                TransportError::with(
                    format!(
                        "failed to connect to database '{}' as user '{}': {}",
                        target, user, e.message
                    ),
                    e.diagnostics,
                )
            })?;
        self.transport.set_date_format(options.date_format)?;

        self.connected = true;
        self.lob_segment_size = reply.lob_segment_size;
        self.api_level = reply.api_level;
        self.current_database = Some(target.to_string());
        debug!(
            target: "auriga::session",
            db = %target,
            segment_size = reply.lob_segment_size,
            api_level = reply.api_level,
            "connected"
        );
        Ok(())
    }

    /// Disconnect, rolling back any open transaction first. Calling this
    /// while already disconnected is a no-op.
    pub fn disconnect(&mut self) -> DriverResult<()> {
        if !self.connected {
            return Ok(());
        }
        if self.tran.is_some() {
            self.rollback_tx(None)?;
        }
        self.transport.disconnect()?;
        self.transport.terminate()?;
        self.connected = false;
        self.stmt = None;
        self.current_database = None;
        debug!(target: "auriga::session", "disconnected");
        Ok(())
    }

    /// Start an explicit transaction: turns autocommit off, then issues the
    /// catalog probe so the transport hands back a transaction handle.
    pub fn start_transaction(&mut self) -> DriverResult<()> {
        if self.tran.is_some() {
            return Err(DriverError::state(
                "unable to start a new transaction; COMMIT or ROLLBACK the existing transaction first",
            ));
        }
        self.autocommit = false;
        self.execute(TRAN_PROBE_SQL, &[])?;
        debug!(target: "auriga::session", tran = ?self.tran, "transaction started");
        Ok(())
    }

    /// Commit the active transaction. Fails when none is active.
    pub fn commit(&mut self) -> DriverResult<()> {
        if self.tran.is_none() {
            return Err(DriverError::state("unable to commit a non-existent transaction"));
        }
        self.commit_tx()
    }

    /// Roll back the whole transaction, or to a named savepoint. Fails when
    /// no transaction is active, or when the savepoint is unknown.
    pub fn rollback(&mut self, savepoint: Option<&str>) -> DriverResult<()> {
        if self.tran.is_none() {
            return Err(DriverError::state("unable to rollback a non-existent transaction"));
        }
        match savepoint {
            None => self.rollback_tx(None),
            Some(name) => {
                // Length first: case folding two different-length names must
                // never produce a false positive.
                let idx = self
                    .savepoints
                    .iter()
                    .position(|e| e.name.len() == name.len() && e.name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| {
                        DriverError::state(format!("savepoint {} does not exist", name))
                    })?;
                let handle = self.savepoints[idx].handle;
                self.rollback_tx(Some(handle))?;
                // Everything created after the target is invalid now; the
                // target itself survives.
                self.savepoints.truncate(idx + 1);
                debug!(
                    target: "auriga::session",
                    savepoint = name,
                    remaining = self.savepoints.len(),
                    "rolled back to savepoint"
                );
                Ok(())
            }
        }
    }

    /// Create a savepoint at the tail of the chain. Meaningless under
    /// autocommit, so it fails without an active transaction.
    pub fn savepoint(&mut self, name: &str) -> DriverResult<()> {
        let tran = self.tran.ok_or_else(|| {
            DriverError::state("unable to create a savepoint with no active transaction")
        })?;
        let handle = self.transport.savepoint(tran, name)?;
        self.savepoints.push(SavepointEntry { name: name.to_string(), handle });
        debug!(target: "auriga::session", savepoint = name, "savepoint created");
        Ok(())
    }

    /// Convenience catalog query: names of the user tables in the current
    /// database.
    pub fn tables(&mut self) -> DriverResult<Vec<String>> {
        let rows = self.execute(TABLES_SQL, &[])?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| match row.drain(..).next() {
                Some(Value::Str(s)) => Some(s),
                _ => None,
            })
            .collect())
    }

    /// Select the session-wide rendering of fetched date/time values.
    pub fn set_date_format(&mut self, format: DateFormat) -> DriverResult<()> {
        if !self.connected {
            return Err(DriverError::state("not connected"));
        }
        self.transport.set_date_format(format)?;
        Ok(())
    }

    // Internal transitions shared with the execution pipeline. These skip
    // the has-transaction validation: the pipeline's autocommit commit runs
    // against the implicitly acquired transaction.

    pub(crate) fn commit_tx(&mut self) -> DriverResult<()> {
        if let Some(tran) = self.tran {
            self.transport.commit(tran)?;
        }
        self.savepoints.clear();
        self.tran = None;
        self.autocommit = true;
        Ok(())
    }

    pub(crate) fn rollback_tx(&mut self, savepoint: Option<SavepointHandle>) -> DriverResult<()> {
        if let Some(tran) = self.tran {
            self.transport.rollback(tran, savepoint)?;
        }
        if savepoint.is_none() {
            self.savepoints.clear();
            self.tran = None;
            self.autocommit = true;
        }
        Ok(())
    }

    // Read-only session and last-execution state.

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn in_transaction(&self) -> bool {
        self.tran.is_some()
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn current_database(&self) -> Option<&str> {
        self.current_database.as_deref()
    }

    pub fn api_level(&self) -> u32 {
        self.api_level
    }

    pub fn lob_segment_size(&self) -> usize {
        self.lob_segment_size
    }

    /// Savepoint names in creation order.
    pub fn savepoint_names(&self) -> Vec<&str> {
        self.savepoints.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn last_savepoint(&self) -> Option<&str> {
        self.savepoints.last().map(|e| e.name.as_str())
    }

    /// Rows affected by the last executed statement.
    pub fn rows_affected(&self) -> i64 {
        self.last_rows_affected
    }

    pub fn column_names(&self) -> &[String] {
        &self.meta.column_names
    }

    /// Per-column type names from the last execution, in the fixed
    /// host-facing vocabulary.
    pub fn data_types(&self) -> &[&'static str] {
        &self.meta.data_types
    }

    /// Per-column raw byte length of the last fetched row.
    pub fn data_sizes(&self) -> &[usize] {
        &self.meta.data_sizes
    }

    /// Non-fatal diagnostics recorded while decoding the last result set.
    pub fn diagnostics(&self) -> &[String] {
        &self.meta.diagnostics
    }

    /// Borrow the underlying transport (mainly for embedders' tests).
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        // Scoped release: never leak the session on any exit path. Errors
        // here have nowhere to go but the log.
        if self.connected {
            if let Err(e) = self.disconnect() {
                debug!(target: "auriga::session", error = %e, "disconnect during drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn connected() -> Connection<MockTransport> {
        let mut conn = Connection::new(MockTransport::new());
        conn.connect("testdb", None, None).expect("connect");
        conn
    }

    #[test]
    fn connect_is_only_valid_when_disconnected() {
        let mut conn = connected();
        match conn.connect("testdb", None, None) {
            Err(DriverError::InvalidState(_)) => {}
            other => panic!("expected invalid-state error, got {:?}", other),
        }
    }

    #[test]
    fn username_without_password_is_rejected() {
        let mut conn = Connection::new(MockTransport::new());
        match conn.connect("testdb", Some("alice"), None) {
            Err(DriverError::Malformed(_)) => {}
            other => panic!("expected malformed error, got {:?}", other),
        }
    }

    #[test]
    fn connect_failure_redacts_the_password() {
        let mut conn =
            Connection::new(MockTransport::new().with_password("alice", "open sesame"));
        let err = conn
            .connect("testdb", Some("alice"), Some("s3cret-hunter2"))
            .expect_err("wrong password must fail");
        let text = err.to_string();
        assert!(text.contains("testdb"));
        assert!(text.contains("alice"));
        assert!(!text.contains("s3cret-hunter2"));
    }

    #[test]
    fn disconnect_is_idempotent_and_never_double_releases() {
        let mut conn = connected();
        conn.disconnect().expect("first disconnect");
        conn.disconnect().expect("second disconnect is a no-op");
        assert_eq!(conn.transport().terminate_calls(), 1);
    }

    #[test]
    fn savepoint_requires_a_transaction() {
        let mut conn = connected();
        match conn.savepoint("sp") {
            Err(DriverError::InvalidState(_)) => {}
            other => panic!("expected invalid-state error, got {:?}", other),
        }
    }

    #[test]
    fn commit_and_rollback_require_a_transaction() {
        let mut conn = connected();
        assert!(matches!(conn.commit(), Err(DriverError::InvalidState(_))));
        assert!(matches!(conn.rollback(None), Err(DriverError::InvalidState(_))));
    }
}
