use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::Deserialize;

use super::TelemetrySource;
use crate::error::FetchError;
use crate::types::{Limb, Sample};

#[derive(Deserialize)]
struct LogFile {
    samples: Vec<Sample>,
}

/// Telemetry recorded to a JSON log (`{"samples": [...]}`), optionally
/// gzip-compressed. Samples are indexed by wearer and kept time-ordered.
#[derive(Debug, Default)]
pub struct SampleLog {
    by_wearer: BTreeMap<String, Vec<Sample>>,
}

impl SampleLog {
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let mut by_wearer: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
        for sample in samples {
            by_wearer.entry(sample.wearer.clone()).or_default().push(sample);
        }
        for samples in by_wearer.values_mut() {
            samples.sort_by_key(|s| s.timestamp);
        }
        SampleLog { by_wearer }
    }

    pub fn load(path: &Path) -> Result<Self, FetchError> {
        let file = File::open(path)
            .map_err(|e| FetchError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let parsed: Result<LogFile, serde_json::Error> = if path.extension().map(|e| e == "gz").unwrap_or(false) {
            let reader = BufReader::new(GzDecoder::new(file));
            serde_json::from_reader(reader)
        } else {
            serde_json::from_reader(BufReader::new(file))
        };
        let log = parsed.map_err(|e| FetchError::Decode(format!("{}: {}", path.display(), e)))?;

        log::info!("Loaded {} samples from {}", log.samples.len(), path.display());
        Ok(Self::from_samples(log.samples))
    }

    pub fn len(&self) -> usize {
        self.by_wearer.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn range(&self, wearer: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<&[Sample], FetchError> {
        if start > end {
            return Err(FetchError::MalformedQuery(format!(
                "range start {} is after stop {}",
                start, end
            )));
        }
        let Some(samples) = self.by_wearer.get(wearer) else {
            return Ok(&[]);
        };
        let lo = samples.partition_point(|s| s.timestamp < start);
        let hi = samples.partition_point(|s| s.timestamp <= end);
        Ok(&samples[lo..hi.max(lo)])
    }
}

impl TelemetrySource for SampleLog {
    fn fetch_samples(
        &self,
        wearer: &str,
        limb: Limb,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>, FetchError> {
        Ok(self
            .range(wearer, start, end)?
            .iter()
            .filter(|s| s.limb == limb)
            .cloned()
            .collect())
    }

    fn fetch_wearer_samples(
        &self,
        wearer: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>, FetchError> {
        Ok(self.range(wearer, start, end)?.to_vec())
    }

    fn wearers_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<String>, FetchError> {
        let mut wearers = Vec::new();
        for wearer in self.by_wearer.keys() {
            if !self.range(wearer, start, end)?.is_empty() {
                wearers.push(wearer.clone());
            }
        }
        Ok(wearers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channels;
    use chrono::TimeZone;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(wearer: &str, limb: Limb, secs: i64) -> Sample {
        Sample {
            timestamp: at(secs),
            limb,
            wearer: wearer.to_string(),
            device_name: "dev".to_string(),
            address: "AA:BB".to_string(),
            channels: Channels::full([0.0, 0.0, 9.8], [0.0, 0.0, 0.0]),
        }
    }

    fn log() -> SampleLog {
        SampleLog::from_samples(vec![
            sample("A", Limb::Left, 30),
            sample("A", Limb::Right, 10),
            sample("A", Limb::Left, 10),
            sample("A", Limb::Left, 20),
            sample("B", Limb::Right, 500),
        ])
    }

    #[test]
    fn test_fetch_is_inclusive_and_ordered() {
        let samples = log().fetch_samples("A", Limb::Left, at(10), at(20)).unwrap();
        let times: Vec<_> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(times, vec![at(10), at(20)]);
    }

    #[test]
    fn test_unknown_wearer_is_empty() {
        assert!(log().fetch_samples("Z", Limb::Left, at(0), at(99)).unwrap().is_empty());
    }

    #[test]
    fn test_inverted_range_is_malformed() {
        let err = log().fetch_wearer_samples("A", at(50), at(0)).unwrap_err();
        assert!(matches!(err, FetchError::MalformedQuery(_)));
    }

    #[test]
    fn test_wearers_in_range() {
        let log = log();
        assert_eq!(log.wearers_in_range(at(0), at(100)).unwrap(), vec!["A".to_string()]);
        assert_eq!(log.wearers_in_range(at(0), at(1000)).unwrap().len(), 2);
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn test_load_gzip_log() {
        let path = std::env::temp_dir().join(format!("gait_monitor_log_{}.json.gz", std::process::id()));
        let body = serde_json::json!({ "samples": [sample("A", Limb::Left, 1)] });
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(body.to_string().as_bytes()).unwrap();
        encoder.finish().unwrap();

        let loaded = SampleLog::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.len(), 1);
        let s = &loaded.fetch_wearer_samples("A", at(0), at(5)).unwrap()[0];
        assert_eq!(s.channels.az, Some(9.8));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = SampleLog::load(Path::new("/nonexistent/samples.json")).unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));
    }
}
