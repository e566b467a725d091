// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! sonic: the target HTTP/1.1 client.
//!
//! A minimal async keep-alive client whose connection pool size bounds the
//! number of in-flight requests. The pool policy decides which idle
//! connection is reused next, see [`PoolPolicy`].

pub mod conn;
pub mod pool;

pub use conn::{Connection, Response, Target};
pub use pool::{ConnectionPool, PoolPolicy};

use crate::error::ClientError;

/// Async HTTP client backed by a fixed-size connection pool.
pub struct SonicClient {
    pool: ConnectionPool,
}

impl SonicClient {
    pub fn new(pool_size: usize, policy: PoolPolicy) -> Self {
        Self {
            pool: ConnectionPool::new(pool_size, policy),
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// GET `url` and read the whole body.
    pub async fn get(&self, url: &str) -> Result<Response, ClientError> {
        let target = Target::parse(url)?;
        self.get_target(&target).await
    }

    /// GET an already parsed target.
    pub async fn get_target(&self, target: &Target) -> Result<Response, ClientError> {
        let slot = self.pool.reserve().await?;

        if let Some(mut conn) = self.pool.checkout(&slot, &target.authority) {
            match conn.get(target).await {
                Ok(response) => {
                    self.pool.checkin(conn);
                    return Ok(response);
                }
                // The server may have closed an idle keep-alive connection.
                Err(ClientError::ConnectionClosed) | Err(ClientError::Io(_)) => {
                    tracing::trace!(
                        authority = %target.authority,
                        served = conn.served(),
                        "Stale pooled connection, reconnecting"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let mut conn = Connection::connect(&target.authority).await?;
        let response = conn.get(target).await?;
        self.pool.checkin(conn);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Keep-alive server that records how many connections are open at once.
    async fn counting_server(delay: Duration) -> (String, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let open = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (open_c, peak_c) = (open.clone(), peak.clone());
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let now = open_c.fetch_add(1, Ordering::SeqCst) + 1;
                peak_c.fetch_max(now, Ordering::SeqCst);
                let open_conn = open_c.clone();
                tokio::spawn(async move {
                    let mut stream = BufReader::new(stream);
                    let mut line = String::new();
                    'requests: loop {
                        loop {
                            line.clear();
                            match stream.read_line(&mut line).await {
                                Ok(0) | Err(_) => break 'requests,
                                Ok(_) if line == "\r\n" => break,
                                Ok(_) => {}
                            }
                        }
                        tokio::time::sleep(delay).await;
                        let reply = b"HTTP/1.1 200 OK\r\ncontent-length: 3\r\n\r\nfoo";
                        if stream.get_mut().write_all(reply).await.is_err() {
                            break;
                        }
                    }
                    open_conn.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        (format!("http://{}/", addr), open, peak)
    }

    #[tokio::test]
    async fn test_pool_size_caps_connections() {
        for policy in [PoolPolicy::Smart, PoolPolicy::Cyclic] {
            let (url, _open, peak) = counting_server(Duration::from_millis(5)).await;
            let client = SonicClient::new(4, policy);
            let responses = join_all((0..40).map(|_| client.get(&url))).await;

            assert_eq!(responses.len(), 40);
            for response in responses {
                let response = response.unwrap();
                assert_eq!(response.status, 200);
                assert_eq!(response.text(), "foo");
            }
            assert!(client.pool().idle_count() <= 4);
            let peak = peak.load(Ordering::SeqCst);
            assert!(peak <= 4, "policy {:?} opened {} connections", policy, peak);
        }
    }

    #[tokio::test]
    async fn test_connections_are_reused() {
        let (url, _open, peak) = counting_server(Duration::ZERO).await;
        let client = SonicClient::new(1, PoolPolicy::Smart);

        for _ in 0..10 {
            client.get(&url).await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(client.pool().idle_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_error_surfaces() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = SonicClient::new(1, PoolPolicy::Smart);
        let result = client.get(&format!("http://127.0.0.1:{}/", port)).await;
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }
}
