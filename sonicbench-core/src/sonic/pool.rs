// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fixed-size connection pool.
//!
//! The pool size is a hard cap on in-flight requests: a caller holds a slot
//! for the whole request, whether it reuses an idle connection or opens a
//! new one.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::ClientError;
use crate::sonic::conn::Connection;

/// Which idle connection is handed out next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolPolicy {
    /// Most recently returned connection first (LIFO), keeping a hot subset busy.
    #[default]
    Smart,
    /// Oldest returned connection first (FIFO), cycling through every connection.
    Cyclic,
}

/// Slot reservation. Dropping it frees the slot.
pub struct PoolSlot<'a> {
    _permit: SemaphorePermit<'a>,
}

pub struct ConnectionPool {
    slots: Semaphore,
    idle: Mutex<VecDeque<Connection>>,
    policy: PoolPolicy,
    size: usize,
}

impl ConnectionPool {
    pub fn new(size: usize, policy: PoolPolicy) -> Self {
        let size = size.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            slots: Semaphore::new(size),
            idle: Mutex::new(VecDeque::new()),
            policy,
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn policy(&self) -> PoolPolicy {
        self.policy
    }

    /// Wait for a free slot.
    pub async fn reserve(&self) -> Result<PoolSlot<'_>, ClientError> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| ClientError::PoolClosed)?;
        Ok(PoolSlot { _permit: permit })
    }

    /// Take an idle connection to `authority`, if any, according to the policy.
    pub fn checkout(&self, _slot: &PoolSlot<'_>, authority: &str) -> Option<Connection> {
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        let position = match self.policy {
            PoolPolicy::Smart => idle.iter().rposition(|c| c.authority() == authority),
            PoolPolicy::Cyclic => idle.iter().position(|c| c.authority() == authority),
        }?;
        idle.remove(position)
    }

    /// Return a connection. Connections that cannot be reused are dropped.
    pub fn checkin(&self, conn: Connection) {
        if !conn.is_reusable() {
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < self.size {
            idle.push_back(conn);
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
