// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! A single keep-alive HTTP/1.1 connection.

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::ClientError;

/// Upper bound on a response head, status line included.
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Upper bound on a chunk-size line.
const MAX_CHUNK_LINE_BYTES: usize = 1024;

/// Upper bound on a decoded response body.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

fn body_too_large(len: usize) -> ClientError {
    ClientError::MalformedResponse {
        reason: format!("body of {} bytes exceeds {} bytes", len, MAX_BODY_BYTES),
    }
}

/// Parsed request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// `host:port`, used both to connect and as the Host header.
    pub authority: String,
    /// Path and query, at least `/`.
    pub path: String,
}

impl Target {
    /// Parse an `http://` URL.
    pub fn parse(url: &str) -> Result<Self, ClientError> {
        let invalid = |reason: &str| ClientError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: hyper::Uri = url.parse().map_err(|_| invalid("cannot parse"))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(_) => return Err(invalid("only http:// is supported")),
            None => return Err(invalid("missing scheme")),
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or(80);
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/");

        Ok(Self {
            authority: format!("{}:{}", host, port),
            path: path.to_string(),
        })
    }
}

/// Response status and fully read body.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

enum BodyFraming {
    Length(usize),
    Chunked,
    UntilClose,
}

/// One TCP connection speaking HTTP/1.1.
#[derive(Debug)]
pub struct Connection {
    authority: String,
    stream: BufReader<TcpStream>,
    reusable: bool,
    served: u64,
}

impl Connection {
    pub async fn connect(authority: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(authority)
            .await
            .map_err(|e| ClientError::Connect {
                authority: authority.to_string(),
                source: e,
            })?;
        stream.set_nodelay(true)?;

        Ok(Self {
            authority: authority.to_string(),
            stream: BufReader::new(stream),
            reusable: true,
            served: 0,
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Whether the connection can carry another request.
    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    pub fn local_port(&self) -> Option<u16> {
        self.stream.get_ref().local_addr().ok().map(|addr| addr.port())
    }

    /// Number of responses read on this connection.
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Send a GET and read the whole response.
    pub async fn get(&mut self, target: &Target) -> Result<Response, ClientError> {
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: sonic/{}\r\nAccept: */*\r\n\r\n",
            target.path,
            target.authority,
            env!("CARGO_PKG_VERSION")
        );

        // Until a full response is read the connection state is unknown.
        self.reusable = false;
        self.stream.get_mut().write_all(request.as_bytes()).await?;

        let (status, framing, keep_alive) = self.read_head().await?;
        let body = match framing {
            BodyFraming::Length(len) => {
                let mut body = vec![0u8; len];
                self.stream.read_exact(&mut body).await?;
                body
            }
            BodyFraming::Chunked => self.read_chunked().await?,
            BodyFraming::UntilClose => {
                let mut body = Vec::new();
                (&mut self.stream)
                    .take(MAX_BODY_BYTES as u64 + 1)
                    .read_to_end(&mut body)
                    .await?;
                if body.len() > MAX_BODY_BYTES {
                    return Err(body_too_large(body.len()));
                }
                body
            }
        };

        self.reusable = keep_alive && !matches!(framing, BodyFraming::UntilClose);
        self.served += 1;

        Ok(Response {
            status,
            body: Bytes::from(body),
        })
    }

    async fn read_head(&mut self) -> Result<(u16, BodyFraming, bool), ClientError> {
        let mut line = String::new();
        let mut head_bytes = 0usize;

        head_bytes += self
            .read_bounded_line(&mut line, MAX_HEAD_BYTES, "response head")
            .await?;

        let mut parts = line.split_whitespace();
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/1.") {
            return Err(ClientError::MalformedResponse {
                reason: format!("unexpected status line {:?}", line.trim_end()),
            });
        }
        let status = parts
            .next()
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| ClientError::MalformedResponse {
                reason: format!("missing status code in {:?}", line.trim_end()),
            })?;
        let mut keep_alive = version != "HTTP/1.0";

        let mut content_length = None;
        let mut chunked = false;

        loop {
            line.clear();
            head_bytes += self
                .read_bounded_line(&mut line, MAX_HEAD_BYTES - head_bytes, "response head")
                .await?;

            let header = line.trim_end();
            if header.is_empty() {
                break;
            }
            let Some((name, value)) = header.split_once(':') else {
                return Err(ClientError::MalformedResponse {
                    reason: format!("bad header line {:?}", header),
                });
            };
            let value = value.trim();

            if name.eq_ignore_ascii_case("content-length") {
                let len = value
                    .parse::<usize>()
                    .map_err(|_| ClientError::MalformedResponse {
                        reason: format!("bad content-length {:?}", value),
                    })?;
                if len > MAX_BODY_BYTES {
                    return Err(body_too_large(len));
                }
                content_length = Some(len);
            } else if name.eq_ignore_ascii_case("transfer-encoding") {
                chunked = value.to_ascii_lowercase().contains("chunked");
            } else if name.eq_ignore_ascii_case("connection") {
                let value = value.to_ascii_lowercase();
                if value.contains("close") {
                    keep_alive = false;
                } else if value.contains("keep-alive") {
                    keep_alive = true;
                }
            }
        }

        // 1xx, 204 and 304 never carry a body
        let framing = if (100..200).contains(&status) || status == 204 || status == 304 {
            BodyFraming::Length(0)
        } else if chunked {
            BodyFraming::Chunked
        } else if let Some(len) = content_length {
            BodyFraming::Length(len)
        } else {
            BodyFraming::UntilClose
        };

        Ok((status, framing, keep_alive))
    }

    async fn read_chunked(&mut self) -> Result<Vec<u8>, ClientError> {
        let mut body = Vec::new();
        let mut line = String::new();

        loop {
            line.clear();
            self.read_bounded_line(&mut line, MAX_CHUNK_LINE_BYTES, "chunk size line")
                .await?;
            let size_field = line.trim_end().split(';').next().unwrap_or_default();
            let size = usize::from_str_radix(size_field.trim(), 16).map_err(|_| {
                ClientError::MalformedResponse {
                    reason: format!("bad chunk size {:?}", size_field),
                }
            })?;

            if size == 0 {
                // Trailers end with an empty line
                let mut trailer_bytes = 0usize;
                loop {
                    line.clear();
                    trailer_bytes += self
                        .read_bounded_line(&mut line, MAX_HEAD_BYTES - trailer_bytes, "trailers")
                        .await?;
                    if line.trim_end().is_empty() {
                        return Ok(body);
                    }
                }
            }
            if size > MAX_BODY_BYTES - body.len() {
                return Err(body_too_large(body.len().saturating_add(size)));
            }

            let start = body.len();
            body.resize(start + size, 0);
            self.stream.read_exact(&mut body[start..]).await?;

            let mut crlf = [0u8; 2];
            self.stream.read_exact(&mut crlf).await?;
            if &crlf != b"\r\n" {
                return Err(ClientError::MalformedResponse {
                    reason: "chunk not terminated by CRLF".to_string(),
                });
            }
        }
    }

    /// Append one line of at most `limit` bytes to `line`.
    async fn read_bounded_line(
        &mut self,
        line: &mut String,
        limit: usize,
        what: &str,
    ) -> Result<usize, ClientError> {
        let too_long = || ClientError::MalformedResponse {
            reason: format!("{} exceeds {} bytes", what, limit),
        };
        if limit == 0 {
            return Err(too_long());
        }

        let read = (&mut self.stream)
            .take(limit as u64)
            .read_line(line)
            .await?;
        if read == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        if !line.ends_with('\n') {
            return Err(if read == limit {
                too_long()
            } else {
                ClientError::ConnectionClosed
            });
        }
        Ok(read)
    }
}
