//! Round and test result rendering

use crate::admin::NetperfResult;
use crate::probe::{EndpointSnapshot, Presenter, RoundSnapshot};
use serde::Serialize;
use std::io::Write;

/// Human-readable round output, one line per endpoint
pub struct TextPresenter<W: Write> {
    out: W,
}

impl<W: Write> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for TextPresenter<W> {
    fn present(&mut self, snapshot: &RoundSnapshot) -> std::io::Result<()> {
        let width = snapshot
            .endpoints
            .iter()
            .map(|e| e.endpoint.to_string().len())
            .max()
            .unwrap_or(0);

        for entry in &snapshot.endpoints {
            writeln!(self.out, "{}", text_line(snapshot.counter, entry, width))?;
        }
        if snapshot.is_distributed() {
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

fn text_line(counter: u64, entry: &EndpointSnapshot, width: usize) -> String {
    let mut line = format!(
        "{:>3}: {:<width$}\tmin={:<10}\tmax={:<10}\taverage={:<10}\terrors={:<4}\troundtrip={}",
        counter,
        entry.endpoint.to_string(),
        entry.min,
        entry.max,
        entry.average,
        entry.error_count,
        entry.roundtrip,
        width = width,
    );
    if let Some(error) = entry.error.as_deref().filter(|_| entry.is_failing()) {
        line.push_str("\terror=");
        line.push_str(error);
    }
    line
}

/// One JSON object per round, newline-delimited
pub struct JsonPresenter<W: Write> {
    out: W,
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for JsonPresenter<W> {
    fn present(&mut self, snapshot: &RoundSnapshot) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, snapshot)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

#[derive(Serialize)]
struct NetperfMessage<'a> {
    status: &'static str,
    #[serde(flatten)]
    result: &'a NetperfResult,
}

/// Render a finished throughput test
pub fn write_netperf<W: Write>(out: &mut W, result: &NetperfResult, json: bool) -> std::io::Result<()> {
    if json {
        let message = NetperfMessage {
            status: "success",
            result,
        };
        serde_json::to_writer(&mut *out, &message)?;
        return writeln!(out);
    }

    let width = result
        .node_results
        .iter()
        .map(|n| n.endpoint.len())
        .max()
        .unwrap_or(0);
    for node in &result.node_results {
        match &node.error {
            Some(error) if !error.is_empty() => {
                writeln!(out, "{:<width$}\tERROR: {}", node.endpoint, error, width = width)?
            }
            _ => writeln!(
                out,
                "{:<width$}\tTX: {}/s\tRX: {}/s",
                node.endpoint,
                format_bytes(node.tx),
                format_bytes(node.rx),
                width = width
            )?,
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct NetperfFailure<'a> {
    status: &'static str,
    error: &'a str,
}

/// Render a throughput test that produced no result, as the final message
pub fn write_netperf_error<W: Write>(out: &mut W, error: &str, json: bool) -> std::io::Result<()> {
    if json {
        let message = NetperfFailure {
            status: "error",
            error,
        };
        serde_json::to_writer(&mut *out, &message)?;
        return writeln!(out);
    }
    writeln!(out, "ERROR: network test failed: {}", error)
}

/// Format bytes in compact IEC form (0B, 1.0KiB, 10MiB, ...)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes == 0 {
        return "0B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exponent = (bytes_f64.ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);

    let value = bytes_f64 / 1024_f64.powi(exponent as i32);

    if exponent == 0 {
        format!("{}B", bytes)
    } else if value >= 10.0 {
        format!("{:.0}{}", value, UNITS[exponent])
    } else {
        format!("{:.1}{}", value, UNITS[exponent])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::NetperfNodeResult;
    use crate::probe::{Endpoint, EndpointStats, ProbeResult};
    use std::time::Duration;

    fn snapshot(counter: u64, results: &[ProbeResult]) -> RoundSnapshot {
        let entries = results
            .iter()
            .map(|r| {
                let stats = EndpointStats::update(None, r);
                EndpointSnapshot::new(r.endpoint.clone(), &stats, r.response_time)
            })
            .collect();
        RoundSnapshot::new(counter, entries)
    }

    fn endpoint(address: &str) -> Endpoint {
        Endpoint::parse(address, "http").unwrap()
    }

    #[test]
    fn test_text_line_success() {
        let snap = snapshot(
            1,
            &[ProbeResult::success(endpoint("localhost:9000"), Duration::from_millis(10))],
        );
        let mut presenter = TextPresenter::new(Vec::new());
        presenter.present(&snap).unwrap();

        let out = String::from_utf8(presenter.into_inner()).unwrap();
        assert!(out.starts_with("  1: http://localhost:9000\tmin=10ms"));
        assert!(out.contains("errors=0"));
        assert!(out.trim_end().ends_with("roundtrip=10ms"));
        assert!(!out.contains("error="));
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn test_text_line_failure_and_distributed_spacing() {
        let snap = snapshot(
            4,
            &[
                ProbeResult::success(endpoint("node1:9000"), Duration::from_millis(3)),
                ProbeResult::failure(endpoint("node2:9000"), Duration::from_secs(5), "timed out"),
            ],
        );
        let mut presenter = TextPresenter::new(Vec::new());
        presenter.present(&snap).unwrap();

        let out = String::from_utf8(presenter.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("errors=1"));
        assert!(lines[1].contains("min=0s"));
        assert!(lines[1].ends_with("error=timed out"));
        assert_eq!(lines[2], "");
    }

    #[test]
    fn test_json_round() {
        let snap = snapshot(
            2,
            &[ProbeResult::failure(endpoint("localhost:9000"), Duration::from_millis(1), "refused")],
        );
        let mut presenter = JsonPresenter::new(Vec::new());
        presenter.present(&snap).unwrap();

        let out = presenter.into_inner();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["counter"], "2");
        let server = &value["servers"][0];
        assert_eq!(server["endpoint"]["host"], "localhost");
        assert_eq!(server["endpoint"]["port"], "9000");
        assert_eq!(server["error-count"], "1");
        assert_eq!(server["error"], "refused");
        assert_eq!(server["roundtrip"], "1ms");
    }

    #[test]
    fn test_netperf_rendering() {
        let result = NetperfResult {
            node_results: vec![
                NetperfNodeResult {
                    endpoint: "node1:9000".to_string(),
                    tx: 1024 * 1024 * 512,
                    rx: 1536,
                    error: None,
                },
                NetperfNodeResult {
                    endpoint: "node2:9000".to_string(),
                    tx: 0,
                    rx: 0,
                    error: Some("connection reset".to_string()),
                },
            ],
        };

        let mut text = Vec::new();
        write_netperf(&mut text, &result, false).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("node1:9000\tTX: 512MiB/s\tRX: 1.5KiB/s"));
        assert!(text.contains("node2:9000\tERROR: connection reset"));

        let mut json = Vec::new();
        write_netperf(&mut json, &result, true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["nodeResults"][0]["tx"], 536870912);
    }

    #[test]
    fn test_netperf_error_rendering() {
        let mut json = Vec::new();
        write_netperf_error(&mut json, "request to node1 timed out", true).unwrap();
        let text = String::from_utf8(json).unwrap();
        assert_eq!(text.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "request to node1 timed out");

        let mut plain = Vec::new();
        write_netperf_error(&mut plain, "connection refused", false).unwrap();
        assert_eq!(
            String::from_utf8(plain).unwrap(),
            "ERROR: network test failed: connection refused\n"
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(1536), "1.5KiB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10MiB");
    }
}
