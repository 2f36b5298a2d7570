//! HTTP probes against a node's `/metadata` and `/metrics` endpoints, and
//! the `antnode --version` invocation. Both endpoints are scraped as plain
//! Prometheus-style text via stable anchor regexes rather than parsed as
//! structured metrics.

use libp2p_identity::PeerId;
use regex::Regex;
use std::str::FromStr;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(thiserror::Error, Debug)]
pub enum MetricsClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Clone, Debug, Default)]
pub struct NodeMetadata {
    pub version: Option<semver::Version>,
    pub peer_id: String,
    pub reachable: bool,
}

#[derive(Clone, Debug, Default)]
pub struct NodeMetrics {
    pub reachable: bool,
    pub uptime: u64,
    pub records: u64,
    pub shunned: u64,
}

pub struct MetricsClient {
    client: reqwest::Client,
}

impl MetricsClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(PROBE_TIMEOUT)
                .build()
                .expect("reqwest client builder"),
        }
    }

    /// `GET /metadata`. Connection failures and any other error are both
    /// folded into `reachable = false`, matching the soft-fault handling in
    /// the error design: an unreachable probe means STOPPED, not fatal.
    pub async fn read_metadata(&self, host: &str, port: u32) -> NodeMetadata {
        let url = format!("http://{host}:{port}/metadata");
        match self.client.get(&url).send().await {
            Ok(resp) => match resp.text().await {
                Ok(body) => parse_metadata(&body),
                Err(_) => NodeMetadata::default(),
            },
            Err(_) => NodeMetadata::default(),
        }
    }

    /// `GET /metrics`.
    pub async fn read_metrics(&self, host: &str, port: u32) -> NodeMetrics {
        let url = format!("http://{host}:{port}/metrics");
        match self.client.get(&url).send().await {
            Ok(resp) => match resp.text().await {
                Ok(body) => parse_metrics(&body),
                Err(_) => NodeMetrics::default(),
            },
            Err(_) => NodeMetrics::default(),
        }
    }
}

impl Default for MetricsClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_metadata(body: &str) -> NodeMetadata {
    let version = Regex::new(r#"\{antnode_version="([\d.]+)"\}"#)
        .unwrap()
        .captures(body)
        .and_then(|c| semver::Version::parse(&c[1]).ok());
    let peer_id = Regex::new(r#"\{peer_id="([\w\d]+)"\}"#)
        .unwrap()
        .captures(body)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    if !peer_id.is_empty() && PeerId::from_str(&peer_id).is_err() {
        tracing::warn!(%peer_id, "metadata endpoint reported a peer id that doesn't parse as a libp2p PeerId");
    }
    NodeMetadata {
        reachable: version.is_some(),
        version,
        peer_id,
    }
}

fn parse_metrics(body: &str) -> NodeMetrics {
    let find = |anchor: &str| -> u64 {
        let pattern = format!(r"{anchor} (\d+)");
        Regex::new(&pattern)
            .unwrap()
            .captures(body)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0)
    };
    NodeMetrics {
        reachable: true,
        uptime: find("ant_node_uptime"),
        records: find("ant_networking_records_stored"),
        shunned: find("ant_networking_shunned_by_close_group"),
    }
}

/// Runs `<binary> --version` and parses the `Autonomi Node v<x.y.z>` output.
pub async fn read_antnode_binary_version(binary: &str) -> Option<semver::Version> {
    let output = tokio::process::Command::new(binary)
        .arg("--version")
        .output()
        .await
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    text.strip_prefix("Autonomi Node v")
        .and_then(|rest| semver::Version::parse(rest.trim()).ok())
        .or_else(|| {
            Regex::new(r"Autonomi Node v([\d.]+)")
                .unwrap()
                .captures(&text)
                .and_then(|c| semver::Version::parse(&c[1]).ok())
        })
}
