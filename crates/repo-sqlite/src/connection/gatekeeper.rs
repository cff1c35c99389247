// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{
    num::NonZeroU64,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::RwLock, task::spawn_blocking, time::sleep};

use crate::{Error, Result};

use super::{get_pooled_connection, ConnectionPool, PooledConnection};

/// Manage database connections for asynchronous tasks.
///
/// Obtaining a pooled connection may block the current thread, so every
/// query runs as a spawned blocking task. Acquiring the pool guard is
/// bounded by a timeout; exceeding it is reported as `TaskTimeout` and
/// callers treat it as a miss at the catalog tier.
#[allow(missing_debug_implementations)]
pub struct Gatekeeper {
    connection_pool: Arc<RwLock<ConnectionPool>>,
    acquire_read_timeout: Duration,
    decommissioned: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub acquire_read_timeout_millis: NonZeroU64,
}

impl Gatekeeper {
    #[must_use]
    pub fn new(connection_pool: ConnectionPool, config: Config) -> Self {
        let Config {
            acquire_read_timeout_millis,
        } = config;
        Self {
            connection_pool: Arc::new(RwLock::new(connection_pool)),
            acquire_read_timeout: Duration::from_millis(acquire_read_timeout_millis.get()),
            decommissioned: AtomicBool::new(false),
        }
    }

    pub fn decommission(&self) {
        self.decommissioned.store(true, Ordering::Release);
    }

    fn check_not_decommissioned(&self) -> Result<()> {
        if self.decommissioned.load(Ordering::Acquire) {
            return Err(Error::TaskTimeout {
                reason: "connection pool has been decommissioned".to_string(),
            });
        }
        Ok(())
    }

    pub async fn spawn_blocking_read_task<H, R>(&self, connection_handler: H) -> Result<R>
    where
        H: FnOnce(PooledConnection) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.check_not_decommissioned()?;
        let timeout = sleep(self.acquire_read_timeout);
        tokio::pin!(timeout);
        tokio::select! {
            _ = &mut timeout => Err(Error::TaskTimeout { reason: "database is locked".to_string() }),
            guard = self.connection_pool.read() => {
                self.check_not_decommissioned()?;
                let connection = get_pooled_connection(&guard)?;
                spawn_blocking(move || connection_handler(connection))
                    .await
                    .map_err(Error::TaskScheduling)
            },
        }
    }
}
