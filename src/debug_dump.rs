use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::models::OptimizeRequest;

/// Per-request timing breakdown, mirrored in the info-level request log.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct Timings {
    pub query_time: f64,
    pub array_time: f64,
    pub optimization_time: f64,
    pub num_products: usize,
    pub num_nutrients: usize,
}

/// Optional observability sink: when `DEBUG_DUMP_DIR` is set, every optimize
/// call writes its input, timings and output CSV into a fresh uniquely-named
/// directory under it. Never required for correctness; failures are logged
/// and swallowed.
pub struct DebugSink {
    base: PathBuf,
}

impl DebugSink {
    pub fn from_env() -> Option<Self> {
        env::var("DEBUG_DUMP_DIR").ok().map(|dir| DebugSink {
            base: PathBuf::from(dir),
        })
    }

    pub fn new(base: PathBuf) -> Self {
        DebugSink { base }
    }

    pub fn dump(&self, request: &OptimizeRequest, timings: &Timings, csv: &str) {
        if let Err(e) = self.try_dump(request, timings, csv) {
            log::warn!("debug dump failed: {e}");
        }
    }

    fn try_dump(
        &self,
        request: &OptimizeRequest,
        timings: &Timings,
        csv: &str,
    ) -> std::io::Result<()> {
        // Timestamp plus a v4 uuid so concurrent requests never collide.
        let name = format!(
            "{}_{}",
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"),
            Uuid::new_v4()
        );
        let dir = self.base.join(name);
        fs::create_dir_all(&dir)?;

        let params = serde_json::to_string_pretty(request).unwrap_or_default();
        fs::write(dir.join("params.json"), params)?;
        let timing_json = serde_json::to_string_pretty(timings).unwrap_or_default();
        fs::write(dir.join("timings.json"), timing_json)?;
        fs::write(dir.join("result.csv"), csv)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_writes_unique_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DebugSink::new(tmp.path().to_path_buf());
        let request = OptimizeRequest {
            currency: Some(crate::models::Currency::Eur),
            objective: None,
            bounds: vec![],
            location_ids: vec![1],
        };
        let timings = Timings {
            query_time: 0.1,
            array_time: 0.01,
            optimization_time: 0.2,
            num_products: 3,
            num_nutrients: 2,
        };

        sink.dump(&request, &timings, "id\n1\n");
        sink.dump(&request, &timings, "id\n2\n");

        let dirs: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(dirs.len(), 2);
        for entry in dirs {
            let dir = entry.unwrap().path();
            assert!(dir.join("params.json").exists());
            assert!(dir.join("timings.json").exists());
            assert!(dir.join("result.csv").exists());
        }
    }

    #[test]
    fn test_dump_failure_is_swallowed() {
        // A sink pointed at an unwritable path must not panic.
        let sink = DebugSink::new(PathBuf::from("/dev/null/not-a-dir"));
        let request = OptimizeRequest {
            currency: None,
            objective: Some("price_eur".to_string()),
            bounds: vec![],
            location_ids: vec![],
        };
        let timings = Timings {
            query_time: 0.0,
            array_time: 0.0,
            optimization_time: 0.0,
            num_products: 0,
            num_nutrients: 0,
        };
        sink.dump(&request, &timings, "");
    }
}
