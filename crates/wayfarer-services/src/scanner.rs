//! Virus scanning against a ClamAV daemon over TCP.
//!
//! The daemon holds the signature database; this module only streams bytes and
//! interprets the verdict. The posture (disabled / fail-open / fail-closed) is
//! fixed at construction and governs what happens when the daemon is
//! unreachable, times out, or answers garbage.

use async_trait::async_trait;
use clamav_client::Tcp;
use std::str;
use std::time::{Duration, Instant};

use wayfarer_core::models::{ScanPosture, ScanVerdict};

/// Pluggable scanning seam for the upload pipeline.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan an in-memory buffer and return a verdict. Never errors: daemon
    /// trouble is folded into the verdict according to the posture.
    async fn scan(&self, data: &[u8], filename: &str) -> ScanVerdict;

    /// Whether the daemon currently answers PING.
    async fn health_check(&self) -> bool;
}

#[derive(Clone)]
pub struct ClamAvScanner {
    host: String,
    port: u16,
    posture: ScanPosture,
    /// Timeout in seconds for each scan operation.
    timeout_secs: u64,
}

impl ClamAvScanner {
    pub fn new(host: String, port: u16, posture: ScanPosture, timeout_secs: u64) -> Self {
        Self {
            host,
            port,
            posture,
            timeout_secs,
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl Scanner for ClamAvScanner {
    /// Scan using the sync client inside `spawn_blocking` to avoid the !Send
    /// tokio futures of the async client, with an outer timeout independent of
    /// any request-level timeout.
    async fn scan(&self, data: &[u8], filename: &str) -> ScanVerdict {
        if self.posture == ScanPosture::Disabled {
            tracing::debug!(filename, "Virus scanning disabled, skipping");
            return ScanVerdict::skipped();
        }

        let start = Instant::now();
        tracing::debug!(host = %self.host, port = self.port, filename, size = data.len(), "Starting virus scan");

        let data = data.to_vec();
        let address = self.address();
        let posture = self.posture;
        let timeout_secs = self.timeout_secs;

        let result = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            tokio::task::spawn_blocking(move || {
                let connection = Tcp {
                    host_address: address.as_str(),
                };
                match clamav_client::scan_buffer(data.as_slice(), connection, None) {
                    Ok(response) => parse_scan_response(&response, posture),
                    Err(e) => {
                        let msg = format!("scan request failed: {}", e);
                        tracing::error!(error = %msg, "Virus scan failed");
                        ScanVerdict::unavailable(msg, posture)
                    }
                }
            }),
        )
        .await;

        let verdict = match result {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                let msg = format!("scan task join error: {}", e);
                tracing::error!(error = %msg, "Virus scan panicked");
                ScanVerdict::unavailable(msg, posture)
            }
            Err(_) => {
                let msg = format!("scan timeout (exceeded {} seconds)", timeout_secs);
                tracing::error!(error = %msg, "Virus scan timed out");
                ScanVerdict::unavailable(msg, posture)
            }
        };

        if verdict.infected {
            tracing::warn!(
                duration_ms = start.elapsed().as_millis() as u64,
                filename,
                signatures = ?verdict.signatures,
                "Virus scan verdict: infected"
            );
        } else {
            tracing::info!(
                duration_ms = start.elapsed().as_millis() as u64,
                filename,
                scanner_available = verdict.scanner_available,
                "Virus scan verdict: clean"
            );
        }
        verdict
    }

    async fn health_check(&self) -> bool {
        if self.posture == ScanPosture::Disabled {
            return true;
        }
        let address = self.address();
        let pong = tokio::task::spawn_blocking(move || {
            let connection = Tcp {
                host_address: address.as_str(),
            };
            clamav_client::ping(connection)
        })
        .await;
        matches!(pong, Ok(Ok(response)) if response.as_slice() == clamav_client::PONG)
    }
}

/// Interpret the raw daemon response.
///
/// Clean scans answer `stream: OK`; detections answer
/// `stream: <SignatureName> FOUND`.
fn parse_scan_response(response: &[u8], posture: ScanPosture) -> ScanVerdict {
    match clamav_client::clean(response) {
        Ok(true) => ScanVerdict::clean(),
        Ok(false) => ScanVerdict::infected(parse_signatures(response)),
        Err(e) => {
            let msg = format!("unparseable daemon response: {}", e);
            tracing::error!(error = %msg, "Failed to parse scan response");
            ScanVerdict::unavailable(msg, posture)
        }
    }
}

fn parse_signatures(response: &[u8]) -> Vec<String> {
    let text = match str::from_utf8(response) {
        Ok(s) => s,
        Err(_) => return vec!["unknown".to_string()],
    };

    let signatures: Vec<String> = text
        .lines()
        .filter(|line| line.contains("FOUND"))
        .filter_map(|line| {
            line.split(':')
                .nth(1)
                .map(|rest| rest.trim().trim_end_matches("FOUND").trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .collect();

    if signatures.is_empty() {
        vec!["unknown".to_string()]
    } else {
        signatures
    }
}
