//! Shared parsing helpers for tool output formats.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

use hostsweep_core::{Result, Severity, SweepError};

/// One CSV record keyed by header name
pub type CsvRow = BTreeMap<String, String>;

/// Decode captured tool output.
///
/// UTF-16LE with a byte-order mark (what several Windows tools emit when
/// redirected) is decoded as such; everything else is lossy UTF-8 with any
/// UTF-8 BOM removed.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Read a text file with [`decode_text`]
pub fn read_text_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| SweepError::io(path, e))?;
    Ok(decode_text(&bytes))
}

/// Parse comma-separated text with a header row
pub fn parse_csv(text: &str) -> Result<Vec<CsvRow>> {
    parse_csv_with(text, b',')
}

/// Parse delimited text with a header row. Short rows are accepted; missing
/// trailing fields are simply absent from the map.
pub fn parse_csv_with(text: &str, delimiter: u8) -> Result<Vec<CsvRow>> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SweepError::Csv(e.to_string()))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SweepError::Csv(e.to_string()))?;
        let row: CsvRow = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// First non-empty value among `keys`, or `""`
#[must_use]
pub fn row_value<'a>(row: &'a CsvRow, keys: &[&str]) -> &'a str {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .map(String::as_str)
        .find(|v| !v.is_empty())
        .unwrap_or("")
}

/// Parse a JSON file
pub fn parse_json_file(path: &Path) -> Result<Value> {
    parse_json_str(&read_text_file(path)?)
}

/// Parse a JSON document
pub fn parse_json_str(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(SweepError::Json)
}

/// First JSON array or object embedded in `text`, skipping leading banner
/// output and ignoring anything after the document
#[must_use]
pub fn first_json_document(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, c)| matches!(c, '[' | '{'))
        .find_map(|(idx, _)| {
            serde_json::Deserializer::from_str(&text[idx..])
                .into_iter::<Value>()
                .next()
                .and_then(std::result::Result::ok)
        })
}

/// Every line of `text` that parses as a JSON value
#[must_use]
pub fn parse_json_lines(text: &str) -> Vec<Value> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

/// One `clamscan` detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClamDetection {
    pub file: String,
    pub signature: String,
}

/// Parsed `clamscan` output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClamScanLog {
    pub detections: Vec<ClamDetection>,
    pub summary: BTreeMap<String, String>,
}

/// Parse `clamscan` output: `<path>: <signature> FOUND` lines and the
/// key/value block after `SCAN SUMMARY`
#[must_use]
pub fn parse_clamscan_log(text: &str) -> ClamScanLog {
    let mut log = ClamScanLog::default();
    let mut in_summary = false;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(body) = line.strip_suffix("FOUND") {
            if let Some((file, signature)) = body.rsplit_once(':') {
                log.detections.push(ClamDetection {
                    file: file.trim().to_string(),
                    signature: signature.trim().to_string(),
                });
            }
            continue;
        }
        if line.contains("SCAN SUMMARY") {
            in_summary = true;
            continue;
        }
        if in_summary {
            if let Some((key, value)) = line.split_once(':') {
                log.summary
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
    }

    log
}

/// Anomaly counters reported by HollowsHunter, in report order
pub const HOLLOWS_HUNTER_COUNTERS: [&str; 7] = [
    "replaced",
    "implanted",
    "hdr_modified",
    "patched",
    "iat_hooked",
    "unreachable_file",
    "other",
];

/// Suspicious process from a HollowsHunter report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub pid: String,
    pub name: String,
    /// Non-zero anomaly counters
    pub counters: BTreeMap<String, u64>,
}

impl ProcessReport {
    fn from_json(pid: String, name: String, data: &Value) -> Option<Self> {
        let counters: BTreeMap<String, u64> = HOLLOWS_HUNTER_COUNTERS
            .iter()
            .filter_map(|k| {
                let n = data.get(*k).and_then(Value::as_u64).unwrap_or(0);
                (n > 0).then(|| ((*k).to_string(), n))
            })
            .collect();
        (!counters.is_empty()).then_some(Self { pid, name, counters })
    }

    /// Count for `counter`, 0 when absent
    #[must_use]
    pub fn count(&self, counter: &str) -> u64 {
        self.counters.get(counter).copied().unwrap_or(0)
    }

    /// Sum of all counters
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counters.values().sum()
    }
}

/// Parse a HollowsHunter output directory.
///
/// Reads `scan_report.json` (a `scanned` map keyed by PID, or a list of
/// entries carrying `pid`) and the per-PID subdirectory reports. Processes
/// are reported once, the summary entry taking precedence.
pub fn parse_hollows_hunter_report(report_dir: &Path) -> Result<Vec<ProcessReport>> {
    let mut reports = Vec::new();
    let mut seen = BTreeSet::new();

    let top = report_dir.join("scan_report.json");
    if top.is_file() {
        match parse_json_file(&top) {
            Ok(data) => collect_summary(&data, &mut reports, &mut seen),
            Err(e) => warn!(path = %top.display(), error = %e, "Unreadable summary report, using process reports only"),
        }
    }

    let mut subdirs: Vec<_> = std::fs::read_dir(report_dir)
        .map_err(|e| SweepError::io(report_dir, e))?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();

    for dir in subdirs {
        let Some(pid) = dir.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        if pid.is_empty() || !pid.bytes().all(|b| b.is_ascii_digit()) || seen.contains(&pid) {
            continue;
        }
        let report = dir.join("scan_report.json");
        if !report.is_file() {
            continue;
        }
        match parse_json_file(&report) {
            Ok(data) => {
                let name = data
                    .get("main_image_path")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                if let Some(r) = ProcessReport::from_json(pid.clone(), name, &data) {
                    seen.insert(pid);
                    reports.push(r);
                }
            }
            Err(e) => warn!(path = %report.display(), error = %e, "Skipping unreadable process report"),
        }
    }

    Ok(reports)
}

fn collect_summary(data: &Value, reports: &mut Vec<ProcessReport>, seen: &mut BTreeSet<String>) {
    let entries: Vec<(String, &Value)> = match data.get("scanned") {
        Some(Value::Object(map)) => map.iter().map(|(pid, v)| (pid.clone(), v)).collect(),
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(|v| json_scalar(v.get("pid")?).map(|pid| (pid, v)))
            .collect(),
        _ => Vec::new(),
    };
    for (pid, info) in entries {
        let name = info
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        if let Some(report) = ProcessReport::from_json(pid.clone(), name, info) {
            seen.insert(pid);
            reports.push(report);
        }
    }
}

fn json_scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map a Hayabusa level (`crit`, `high`, `med`, `low`, `info`, long forms
/// included) to a severity. Unknown levels are informational.
#[must_use]
pub fn severity_from_hayabusa_level(level: &str) -> Severity {
    match level.trim().to_ascii_lowercase().as_str() {
        "critical" | "crit" => Severity::Critical,
        "high" => Severity::High,
        "medium" | "med" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Info,
    }
}

/// Map a Sigma rule level to a severity. Unknown levels are informational.
#[must_use]
pub fn severity_from_sigma_level(level: &str) -> Severity {
    match level.trim().to_ascii_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_clamscan_log() {
        let text = "\
/home/u/eicar.com: Win.Test.EICAR_HDB-1 FOUND
C:\\Users\\u\\dl\\bad.exe: Win.Trojan.Agent-123 FOUND
/home/u/clean.txt: OK

----------- SCAN SUMMARY -----------
Known viruses: 8695218
Scanned files: 3
Infected files: 2
Time: 1.234 sec (0 m 1 s)
";
        let log = parse_clamscan_log(text);
        assert_eq!(log.detections.len(), 2);
        assert_eq!(log.detections[0].file, "/home/u/eicar.com");
        assert_eq!(log.detections[0].signature, "Win.Test.EICAR_HDB-1");
        assert_eq!(log.detections[1].file, "C:\\Users\\u\\dl\\bad.exe");
        assert_eq!(log.summary.get("Infected files").map(String::as_str), Some("2"));
        assert_eq!(log.summary.get("Time").map(String::as_str), Some("1.234 sec (0 m 1 s)"));
    }

    #[test]
    fn test_csv_rows() {
        let text = "\u{feff}Path,Verified,Publisher\n\"C:\\a b\\x.exe\",Unsigned,n/a\nC:\\y.exe,Signed\n";
        let rows = parse_csv(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Path"], "C:\\a b\\x.exe");
        assert_eq!(rows[0]["Verified"], "Unsigned");
        assert!(!rows[1].contains_key("Publisher"));
        assert_eq!(row_value(&rows[1], &["Publisher", "Verified"]), "Signed");
        assert_eq!(row_value(&rows[1], &["Nope"]), "");
    }

    #[test]
    fn test_decode_utf16() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Entry,Verified".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes), "Entry,Verified");
        assert_eq!(decode_text(b"\xEF\xBB\xBFplain"), "plain");
    }

    #[test]
    fn test_first_json_document_skips_banner() {
        let text = "Chainsaw v2 banner\n[+] Loading\n[{\"name\":\"x\"}]\ntrailing noise";
        let value = first_json_document(text).unwrap();
        assert_eq!(value[0]["name"], "x");
        assert!(first_json_document("no json here").is_none());
    }

    #[test]
    fn test_json_lines() {
        let values = parse_json_lines("{\"a\":1}\nnot json\n\n{\"a\":2}\n");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_hollows_hunter_report_dedupes_by_pid() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("scan_report.json"),
            r#"{"scanned": {
                "1234": {"name": "evil.exe", "replaced": 2, "implanted": 1, "hdr_modified": 0},
                "42": {"name": "clean.exe", "replaced": 0}
            }}"#,
        )
        .unwrap();

        let dup = dir.path().join("1234");
        fs::create_dir(&dup).unwrap();
        fs::write(dup.join("scan_report.json"), r#"{"main_image_path": "C:\\evil.exe", "replaced": 5}"#)
            .unwrap();

        let extra = dir.path().join("777");
        fs::create_dir(&extra).unwrap();
        fs::write(
            extra.join("scan_report.json"),
            r#"{"main_image_path": "C:\\svc.exe", "patched": 3}"#,
        )
        .unwrap();

        fs::create_dir(dir.path().join("notapid")).unwrap();

        let reports = parse_hollows_hunter_report(dir.path()).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].pid, "1234");
        assert_eq!(reports[0].count("replaced"), 2);
        assert_eq!(reports[0].count("implanted"), 1);
        assert_eq!(reports[0].total(), 3);
        assert_eq!(reports[1].pid, "777");
        assert_eq!(reports[1].name, "C:\\svc.exe");
    }

    #[test]
    fn test_hollows_hunter_malformed_summary_keeps_process_reports() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scan_report.json"), "{ truncated").unwrap();
        let proc_dir = dir.path().join("777");
        fs::create_dir(&proc_dir).unwrap();
        fs::write(
            proc_dir.join("scan_report.json"),
            r#"{"main_image_path": "C:\\svc.exe", "replaced": 3}"#,
        )
        .unwrap();

        let reports = parse_hollows_hunter_report(dir.path()).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].pid, "777");
        assert_eq!(reports[0].count("replaced"), 3);
    }

    #[test]
    fn test_severity_vocabularies() {
        assert_eq!(severity_from_hayabusa_level("CRIT"), Severity::Critical);
        assert_eq!(severity_from_hayabusa_level(" med "), Severity::Medium);
        assert_eq!(severity_from_hayabusa_level("informational"), Severity::Info);
        assert_eq!(severity_from_hayabusa_level("bogus"), Severity::Info);
        assert_eq!(severity_from_sigma_level("High"), Severity::High);
        assert_eq!(severity_from_sigma_level("crit"), Severity::Info);
        assert_eq!(severity_from_sigma_level("med"), Severity::Info);
        assert_eq!(severity_from_sigma_level(""), Severity::Info);
    }
}
