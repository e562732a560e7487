//! HTML page of response time charts rendered with
//! [ECharts](https://echarts.apache.org).
//!
//! Every chart is an ECharts option object built with `serde_json`; the page
//! only wires each one to its own `<div>`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::error::Result;
use crate::stats::Results;

const BUCKETS: usize = 20;
const PERCENTILES: [u32; 5] = [50, 75, 90, 95, 99];
const ECHARTS_URL: &str = "https://cdn.jsdelivr.net/npm/echarts@5/dist/echarts.min.js";

/// Renders the chart page for finalized `results`.
pub fn render_html(results: &Results) -> String {
    let valid = results.valid_times();
    let mut charts = vec![
        ("response-time-histogram", histogram_chart(valid)),
        ("response-time-cdf", cdf_chart(valid)),
    ];
    if !valid.is_empty() {
        charts.push(("percentile-distribution", percentile_chart(valid)));
    }
    charts.push(("status-codes", status_code_chart(results)));
    charts.push(("error-rate", error_rate_chart(results)));

    let mut page = String::new();
    page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str("<title>Load Test Results</title>\n");
    let _ = writeln!(page, "<script src=\"{}\"></script>", ECHARTS_URL);
    page.push_str("</head>\n<body>\n");
    for (id, _) in &charts {
        let _ = writeln!(
            page,
            r#"<div id="{}" style="width:900px;height:500px;margin:24px auto;"></div>"#,
            id
        );
    }
    page.push_str("<script>\n");
    for (id, option) in &charts {
        let _ = writeln!(
            page,
            "echarts.init(document.getElementById('{}')).setOption({});",
            id, option
        );
    }
    page.push_str("</script>\n</body>\n</html>\n");
    page
}

/// Writes the chart page to `path`.
pub fn write_html(results: &Results, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, render_html(results))?;
    Ok(())
}

/// Splits `[min, max]` of the sorted samples into equal buckets. With no
/// spread every sample lands in the first bucket.
fn histogram(valid: &[f64]) -> (Vec<String>, Vec<u64>) {
    let (min, max) = match (valid.first(), valid.last()) {
        (Some(min), Some(max)) => (*min, *max),
        _ => (0.0, 0.0),
    };
    let width = (max - min) / BUCKETS as f64;

    let mut counts = vec![0u64; BUCKETS];
    for t in valid {
        let bucket = if width > 0.0 {
            (((t - min) / width) as usize).min(BUCKETS - 1)
        } else {
            0
        };
        counts[bucket] += 1;
    }
    let labels = (0..BUCKETS)
        .map(|i| format!("{:.2}", min + i as f64 * width))
        .collect();
    (labels, counts)
}

fn cdf(valid: &[f64]) -> Vec<[f64; 2]> {
    let n = valid.len() as f64;
    valid
        .iter()
        .enumerate()
        .map(|(i, t)| [*t, (i + 1) as f64 / n])
        .collect()
}

fn percentiles(valid: &[f64]) -> Vec<(String, f64)> {
    PERCENTILES
        .iter()
        .map(|p| {
            let index = (valid.len() - 1) * *p as usize / 100;
            (format!("P{}", p), valid[index])
        })
        .collect()
}

/// Failed status codes plus every success counted under 200.
fn status_codes(results: &Results) -> BTreeMap<u16, u64> {
    let mut codes = BTreeMap::new();
    for code in &results.failed_status_codes {
        *codes.entry(*code).or_insert(0) += 1;
    }
    *codes.entry(200).or_insert(0) += results.successful_requests;
    codes
}

fn histogram_chart(valid: &[f64]) -> Value {
    let (labels, counts) = histogram(valid);
    json!({
        "title": { "text": "Response Time Distribution" },
        "tooltip": { "trigger": "axis" },
        "xAxis": { "type": "category", "name": "Response Time (s)", "data": labels },
        "yAxis": { "type": "value", "name": "Frequency" },
        "series": [{ "name": "Response Time", "type": "bar", "data": counts }],
    })
}

fn cdf_chart(valid: &[f64]) -> Value {
    json!({
        "title": { "text": "Cumulative Distribution Function" },
        "tooltip": { "trigger": "axis" },
        "xAxis": { "type": "value", "name": "Response Time (s)" },
        "yAxis": { "type": "value", "name": "Cumulative Probability", "max": 1 },
        "series": [{ "name": "CDF", "type": "line", "symbol": "none", "data": cdf(valid) }],
    })
}

fn percentile_chart(valid: &[f64]) -> Value {
    let (labels, values): (Vec<_>, Vec<_>) = percentiles(valid).into_iter().unzip();
    json!({
        "title": { "text": "Percentile Distribution" },
        "tooltip": { "trigger": "axis" },
        "xAxis": { "type": "category", "name": "Percentile", "data": labels },
        "yAxis": { "type": "value", "name": "Response Time (s)" },
        "series": [{ "name": "Percentile", "type": "line", "data": values }],
    })
}

fn status_code_chart(results: &Results) -> Value {
    let codes = status_codes(results);
    let labels: Vec<String> = codes.keys().map(|code| code.to_string()).collect();
    let counts: Vec<u64> = codes.values().copied().collect();
    json!({
        "title": { "text": "Status Code Distribution" },
        "tooltip": { "trigger": "axis" },
        "xAxis": { "type": "category", "name": "Status Code", "data": labels },
        "yAxis": { "type": "value", "name": "Count" },
        "series": [{ "name": "Status Codes", "type": "bar", "data": counts }],
    })
}

fn error_rate_chart(results: &Results) -> Value {
    json!({
        "title": { "text": "Error Rate" },
        "tooltip": { "trigger": "item" },
        "series": [{
            "name": "Error Rate",
            "type": "pie",
            "label": { "show": true, "formatter": "{b}: {c} ({d}%)" },
            "data": [
                { "name": "Successful", "value": results.successful_requests },
                { "name": "Failed", "value": results.failed_requests },
            ],
        }],
    })
}
