//! FileSink - appends estimates to a JSON-lines file

use chrono::Local;
use contracts::{ContractError, DataSink, FuelEstimate};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

use crate::DispatcherError;

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file; `strftime` tokens (e.g. `%Y%m%d`) are expanded when opened
    pub path: String,
    /// Append to an existing file instead of truncating it
    pub append: bool,
    /// Flush after this many records (0 flushes only on shutdown)
    pub flush_every: usize,
}

impl FileSinkConfig {
    /// Build config from sink params (`path` required)
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| "missing 'path' parameter".to_string())?
            .clone();

        let append = match params.get("append").map(String::as_str) {
            None | Some("true") => true,
            Some("false") => false,
            Some(other) => return Err(format!("invalid 'append' value '{}'", other)),
        };

        let flush_every = match params.get("flush_every") {
            Some(s) => s
                .parse()
                .map_err(|e| format!("invalid 'flush_every' value '{}': {}", s, e))?,
            None => 100,
        };

        Ok(Self {
            path,
            append,
            flush_every,
        })
    }

    /// Resolve the output path for the current local date
    pub fn resolved_path(&self) -> PathBuf {
        if self.path.contains('%') {
            PathBuf::from(Local::now().format(&self.path).to_string())
        } else {
            PathBuf::from(&self.path)
        }
    }
}

/// Sink that writes one JSON object per line
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    flush_every: usize,
    pending: usize,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        let path = config.resolved_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(config.append)
            .truncate(!config.append)
            .open(&path)?;

        Ok(Self {
            name: name.into(),
            path,
            writer: BufWriter::new(file),
            flush_every: config.flush_every,
            pending: 0,
        })
    }

    /// Create from params map (for the dispatcher builder)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|message| DispatcherError::invalid_params(&name, message))?;
        let path = config.resolved_path();
        Self::new(name.clone(), config).map_err(|source| DispatcherError::SinkOpen {
            name,
            path,
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_line(&mut self, estimate: &FuelEstimate) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, estimate)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(b"\n")?;

        self.pending += 1;
        if self.flush_every > 0 && self.pending >= self.flush_every {
            self.writer.flush()?;
            self.pending = 0;
        }
        Ok(())
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, estimate),
        fields(sink = %self.name, vehicle_id = %estimate.vehicle_id)
    )]
    async fn write(&mut self, estimate: &FuelEstimate) -> Result<(), ContractError> {
        self.append_line(estimate).map_err(|e| {
            error!(sink = %self.name, timestamp = estimate.timestamp, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.pending = 0;
        self.writer
            .flush()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        debug!(sink = %self.name, path = %self.path.display(), "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::estimate;
    use tempfile::tempdir;

    fn params(path: &Path) -> HashMap<String, String> {
        HashMap::from([("path".to_string(), path.display().to_string())])
    }

    #[tokio::test]
    async fn test_file_sink_writes_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("estimates.jsonl");

        let mut sink = FileSink::from_params("test_file", &params(&path)).unwrap();
        sink.write(&estimate("v1", 1.0)).await.unwrap();
        sink.write(&estimate("v2", 2.0)).await.unwrap();
        sink.close().await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: FuelEstimate = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.vehicle_id, "v2");
        assert_eq!(parsed.timestamp, 2.0);
    }

    #[tokio::test]
    async fn test_file_sink_append_and_truncate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("estimates.jsonl");

        for _ in 0..2 {
            let mut sink = FileSink::from_params("append", &params(&path)).unwrap();
            sink.write(&estimate("v1", 1.0)).await.unwrap();
            sink.close().await.unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);

        let mut p = params(&path);
        p.insert("append".into(), "false".into());
        let mut sink = FileSink::from_params("truncate", &p).unwrap();
        sink.write(&estimate("v1", 3.0)).await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_config_requires_path() {
        assert!(FileSinkConfig::from_params(&HashMap::new()).is_err());

        let mut p = HashMap::from([("path".to_string(), "x.jsonl".to_string())]);
        p.insert("flush_every".into(), "abc".into());
        assert!(FileSinkConfig::from_params(&p).is_err());
    }

    #[test]
    fn test_path_date_expansion() {
        let config = FileSinkConfig {
            path: "estimates-%Y.jsonl".into(),
            append: true,
            flush_every: 0,
        };
        let resolved = config.resolved_path().display().to_string();
        assert!(!resolved.contains('%'));
        assert!(resolved.starts_with("estimates-2"));
    }
}
