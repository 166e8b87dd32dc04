//! Round-robin pool of keep-alive HTTP clients.
//!
//! A single `reqwest::Client` multiplexes connections through one pool; under
//! very high concurrency that single pool becomes a contention point. Fanning
//! requests out across a handful of independently-pooled clients keeps each
//! pool's queue short while bounding the total file-descriptor budget.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Client;

use crate::error::{Error, Result};

const DEFAULT_MAX_CONNECTIONS_PER_CLIENT: usize = 50;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Compute the pool fan-out for a given worker count: `clamp(runners/20, 3, 10)`.
pub fn default_pool_size(num_runners: usize) -> usize {
    (num_runners / 20).clamp(3, 10)
}

/// A fixed set of pre-constructed clients, handed out round-robin.
pub struct ClientPool {
    clients: Vec<Client>,
    next: AtomicUsize,
}

impl ClientPool {
    /// Build a pool of `pool_size` clients, each allowing up to
    /// `max_connections_per_client` idle keep-alive connections and enforcing
    /// `request_timeout` per call. Retries are always disabled: an
    /// automatically-retried request would corrupt TTFT/latency measurements.
    pub fn new(
        pool_size: usize,
        max_connections_per_client: usize,
        request_timeout: Duration,
    ) -> Result<Self> {
        let mut clients = Vec::with_capacity(pool_size.max(1));
        for _ in 0..pool_size.max(1) {
            let client = Client::builder()
                .pool_max_idle_per_host(max_connections_per_client)
                .timeout(request_timeout)
                .build()
                .map_err(Error::Transport)?;
            clients.push(client);
        }
        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
        })
    }

    /// Build a pool using the default connection budget and timeout for
    /// `num_runners` workers.
    pub fn for_runners(num_runners: usize) -> Result<Self> {
        Self::new(
            default_pool_size(num_runners),
            DEFAULT_MAX_CONNECTIONS_PER_CLIENT,
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    /// Hand out the next client in round-robin order.
    pub fn get(&self) -> &Client {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[idx]
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
