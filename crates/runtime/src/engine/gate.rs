//! Connection pooling and the meta/OLAP admission lanes.
//!
//! Meta queries (catalog and schema introspection) are usually fast; OLAP
//! scans can run for a long time. To keep introspection responsive the gate
//! reserves one pooled connection for meta traffic and admits OLAP work
//! through the priority semaphore sized at `pool_size - 1` (floor 1).
//!
//! With `pool_size == 1` both lanes admit one holder each and contend on
//! the pool's own ticketing; that contention is accepted.

use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use super::{Connection, Dialect, Engine, ResultSet, Statement};
use crate::error::QueryError;
use crate::semaphore::PrioritySemaphore;

/// Statements run on every freshly opened physical connection before it
/// serves queries.
pub const BOOT_STATEMENTS: &[&str] = &[
    "INSTALL 'json'",
    "LOAD 'json'",
    "INSTALL 'parquet'",
    "LOAD 'parquet'",
    "INSTALL 'httpfs'",
    "LOAD 'httpfs'",
    "SET max_expression_depth TO 250",
];

pub type SharedConn = Arc<AsyncMutex<Box<dyn Connection>>>;

/// Per-request execution context: the cancellation token plus, inside a
/// `with_connection` scope, the connection the outer holder already owns.
#[derive(Clone, Default)]
pub struct ExecCtx {
    cancel: CancellationToken,
    conn: Option<SharedConn>,
}

impl ExecCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self { cancel, conn: None }
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn held_conn(&self) -> Option<&SharedConn> {
        self.conn.as_ref()
    }

    fn child_with_conn(&self, conn: SharedConn) -> Self {
        Self {
            cancel: self.cancel.clone(),
            conn: Some(conn),
        }
    }
}

struct PoolInner {
    engine: Arc<dyn Engine>,
    idle: Mutex<Vec<Box<dyn Connection>>>,
    /// Caps open physical connections at `pool_size`.
    tickets: Arc<Semaphore>,
}

impl PoolInner {
    async fn checkout(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(Box<dyn Connection>, OwnedSemaphorePermit), QueryError> {
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        let ticket = tokio::select! {
            t = self.tickets.clone().acquire_owned() => {
                t.map_err(|_| QueryError::Internal("connection pool closed".into()))?
            }
            _ = cancel.cancelled() => return Err(QueryError::Cancelled),
        };

        if let Some(conn) = self.idle.lock().unwrap().pop() {
            return Ok((conn, ticket));
        }

        let mut conn = self.engine.open().await.map_err(QueryError::from)?;
        for sql in BOOT_STATEMENTS {
            conn.execute(&Statement::new(*sql), cancel).await?;
        }
        Ok((conn, ticket))
    }

    fn checkin(&self, conn: Box<dyn Connection>) {
        self.idle.lock().unwrap().push(conn);
    }
}

enum Lane {
    Meta(OwnedSemaphorePermit),
    Olap(Arc<PrioritySemaphore>),
}

struct Release {
    pool: Arc<PoolInner>,
    ticket: OwnedSemaphorePermit,
    lane: Lane,
}

/// Scoped ownership of one pooled connection plus its admission permit.
///
/// Dropping the guard returns the connection to the pool, then releases the
/// semaphore, in that order; it runs exactly once on every exit path. A
/// guard built from a context-held connection releases nothing.
pub struct ConnGuard {
    conn: Option<SharedConn>,
    release: Option<Release>,
}

impl std::fmt::Debug for ConnGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnGuard").finish_non_exhaustive()
    }
}

impl ConnGuard {
    fn passthrough(conn: SharedConn) -> Self {
        Self {
            conn: Some(conn),
            release: None,
        }
    }

    pub fn shared(&self) -> SharedConn {
        self.conn
            .as_ref()
            .expect("guard accessed after release")
            .clone()
    }
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            if let Some(shared) = self.conn.take() {
                match Arc::try_unwrap(shared) {
                    Ok(mutex) => release.pool.checkin(mutex.into_inner()),
                    Err(_) => {
                        tracing::warn!("connection still referenced at release; closing it");
                    }
                }
            }
            drop(release.ticket);
            match release.lane {
                Lane::Meta(permit) => drop(permit),
                Lane::Olap(sem) => sem.release(),
            }
        }
    }
}

/// The connection-management front of one engine instance.
pub struct ConnectionGate {
    dialect: Dialect,
    pool: Arc<PoolInner>,
    meta_sem: Arc<Semaphore>,
    olap_sem: Arc<PrioritySemaphore>,
}

impl ConnectionGate {
    pub fn new(engine: Arc<dyn Engine>, pool_size: usize) -> Self {
        assert!(pool_size >= 1, "pool_size must be at least 1");
        // One connection is reserved for meta queries; the rest serve OLAP.
        let olap_size = pool_size.saturating_sub(1).max(1);
        Self {
            dialect: engine.dialect(),
            pool: Arc::new(PoolInner {
                engine,
                idle: Mutex::new(Vec::new()),
                tickets: Arc::new(Semaphore::new(pool_size)),
            }),
            meta_sem: Arc::new(Semaphore::new(1)),
            olap_sem: Arc::new(PrioritySemaphore::new(olap_size)),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Current OLAP admissions, for introspection and tests.
    pub fn olap_in_use(&self) -> usize {
        self.olap_sem.in_use()
    }

    /// Acquires a connection for a fast catalog/introspection query.
    pub async fn acquire_meta(&self, ctx: &ExecCtx) -> Result<ConnGuard, QueryError> {
        if let Some(conn) = ctx.held_conn() {
            return Ok(ConnGuard::passthrough(conn.clone()));
        }
        if ctx.cancel().is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        let permit = tokio::select! {
            p = self.meta_sem.clone().acquire_owned() => {
                p.map_err(|_| QueryError::Internal("meta semaphore closed".into()))?
            }
            _ = ctx.cancel().cancelled() => return Err(QueryError::Cancelled),
        };

        let (conn, ticket) = self.pool.checkout(ctx.cancel()).await?;
        Ok(ConnGuard {
            conn: Some(Arc::new(AsyncMutex::new(conn))),
            release: Some(Release {
                pool: self.pool.clone(),
                ticket,
                lane: Lane::Meta(permit),
            }),
        })
    }

    /// Acquires a connection for an OLAP query at the given priority.
    pub async fn acquire_olap(&self, ctx: &ExecCtx, priority: i32) -> Result<ConnGuard, QueryError> {
        if let Some(conn) = ctx.held_conn() {
            return Ok(ConnGuard::passthrough(conn.clone()));
        }

        self.olap_sem
            .acquire(ctx.cancel(), priority)
            .await
            .map_err(|_| QueryError::Cancelled)?;

        match self.pool.checkout(ctx.cancel()).await {
            Ok((conn, ticket)) => Ok(ConnGuard {
                conn: Some(Arc::new(AsyncMutex::new(conn))),
                release: Some(Release {
                    pool: self.pool.clone(),
                    ticket,
                    lane: Lane::Olap(self.olap_sem.clone()),
                }),
            }),
            Err(e) => {
                self.olap_sem.release();
                Err(e)
            }
        }
    }

    /// Executes one OLAP statement; the returned set holds the connection
    /// until it is dropped.
    pub async fn execute(&self, ctx: &ExecCtx, stmt: Statement) -> Result<ResultSet, QueryError> {
        let guard = self.acquire_olap(ctx, stmt.priority).await?;
        self.run(guard, ctx, stmt).await
    }

    /// Executes one meta statement.
    pub async fn execute_meta(
        &self,
        ctx: &ExecCtx,
        stmt: Statement,
    ) -> Result<ResultSet, QueryError> {
        let guard = self.acquire_meta(ctx).await?;
        self.run(guard, ctx, stmt).await
    }

    async fn run(
        &self,
        guard: ConnGuard,
        ctx: &ExecCtx,
        stmt: Statement,
    ) -> Result<ResultSet, QueryError> {
        let shared = guard.shared();
        let result = {
            let mut conn = shared.lock().await;
            conn.execute(&stmt, ctx.cancel()).await
        };
        drop(shared);
        match result {
            Ok(raw) => Ok(ResultSet::new(raw.schema, raw.cursor, Some(guard))),
            Err(e) => Err(e.into()),
        }
    }

    /// Runs `f` with an exclusively held OLAP connection threaded through a
    /// child context, so nested acquires inside `f` reuse it instead of
    /// taking another permit.
    pub async fn with_connection<T, F, Fut>(
        &self,
        ctx: &ExecCtx,
        priority: i32,
        f: F,
    ) -> Result<T, QueryError>
    where
        F: FnOnce(ExecCtx) -> Fut,
        Fut: std::future::Future<Output = Result<T, QueryError>>,
    {
        let guard = self.acquire_olap(ctx, priority).await?;
        let child = ctx.child_with_conn(guard.shared());
        let result = f(child).await;
        drop(guard);
        result
    }
}
