use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::reports::{load_season, AnalysisOptions, SeasonReport, SeasonSources};

const DEFAULT_CAPACITY: usize = 8;

/// Feed a source into the hasher: a file's bytes, or every CSV in a directory by name.
fn hash_source(hasher: &mut Sha256, path: &Path) -> Result<()> {
    if path.is_dir() {
        let mut files: Vec<_> = std::fs::read_dir(path)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
            })
            .collect();
        files.sort();
        for file in files {
            if let Some(name) = file.file_name() {
                hasher.update(name.to_string_lossy().as_bytes());
            }
            hasher.update(std::fs::read(&file)?);
        }
    } else {
        hasher.update(std::fs::read(path)?);
    }
    Ok(())
}

/// Content key for one analysis: both sources plus every option that shapes the result.
pub fn compute_checksum(sources: &SeasonSources, opts: &AnalysisOptions) -> Result<String> {
    let mut hasher = Sha256::new();
    hash_source(&mut hasher, &sources.ledger)?;
    hasher.update([0u8]);
    match &sources.reference {
        // An unreadable reference is part of the result, so it hashes as absent.
        Some(path) if path.exists() => hash_source(&mut hasher, path)?,
        _ => hasher.update(b"-"),
    }
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(opts)?);
    Ok(hex::encode(hasher.finalize()))
}

/// Memoizes season reports by content hash. Holds the most recent few results.
#[derive(Debug)]
pub struct SeasonCache {
    entries: VecDeque<(String, Arc<SeasonReport>)>,
    capacity: usize,
    pub hits: usize,
    pub misses: usize,
}

impl Default for SeasonCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SeasonCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached report for the current source contents, loading it on a miss.
    /// The flag is `true` when the report was freshly computed.
    pub fn get_or_load(
        &mut self,
        sources: &SeasonSources,
        opts: &AnalysisOptions,
    ) -> Result<(Arc<SeasonReport>, bool)> {
        let key = compute_checksum(sources, opts)?;
        let short = key[..12].to_string();
        if let Some(pos) = self.entries.iter().position(|(k, _)| *k == key) {
            if let Some((_, report)) = self.entries.remove(pos) {
                self.hits += 1;
                self.entries.push_back((key, Arc::clone(&report)));
                debug!(key = %short, "season cache hit");
                return Ok((report, false));
            }
        }

        self.misses += 1;
        let report = Arc::new(load_season(sources, opts)?);
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        debug!(key = %short, "season cache miss");
        self.entries.push_back((key, Arc::clone(&report)));
        Ok((report, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::FallbackPolicy;
    use crate::importer::tests::{ledger_grid, reference_grid, write_csv};

    fn fixture(dir: &Path) -> SeasonSources {
        let ledger = dir.join("custos");
        std::fs::create_dir_all(&ledger).unwrap();
        write_csv(
            &ledger.join("Fazenda A.csv"),
            &ledger_grid(&[("Adubo", 1200.0, 100.0, vec![100.0])]),
        );
        let reference = dir.join("safra.csv");
        write_csv(&reference, &reference_grid());
        SeasonSources {
            ledger,
            reference: Some(reference),
        }
    }

    #[test]
    fn test_unchanged_sources_hit() {
        let dir = tempfile::tempdir().unwrap();
        let sources = fixture(dir.path());
        let opts = AnalysisOptions::default();
        let mut cache = SeasonCache::default();
        assert!(cache.is_empty());

        let (first, fresh) = cache.get_or_load(&sources, &opts).unwrap();
        assert!(fresh);
        let (second, fresh) = cache.get_or_load(&sources, &opts).unwrap();
        assert!(!fresh);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((cache.hits, cache.misses), (1, 1));
    }

    #[test]
    fn test_content_change_misses() {
        let dir = tempfile::tempdir().unwrap();
        let sources = fixture(dir.path());
        let opts = AnalysisOptions::default();
        let mut cache = SeasonCache::default();
        cache.get_or_load(&sources, &opts).unwrap();

        write_csv(
            &sources.ledger.join("Fazenda A.csv"),
            &ledger_grid(&[("Adubo", 1200.0, 100.0, vec![100.0, 90.0])]),
        );
        let (report, fresh) = cache.get_or_load(&sources, &opts).unwrap();
        assert!(fresh);
        assert_eq!(report.reports().next().unwrap().pivot.rows.len(), 3);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_options_are_part_of_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let sources = fixture(dir.path());
        let unified = AnalysisOptions::default();
        let legacy = AnalysisOptions {
            policy: FallbackPolicy::ForecastOnly,
            ..AnalysisOptions::default()
        };
        assert_ne!(
            compute_checksum(&sources, &unified).unwrap(),
            compute_checksum(&sources, &legacy).unwrap()
        );
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let sources = fixture(dir.path());
        let mut cache = SeasonCache::with_capacity(1);
        let unified = AnalysisOptions::default();
        let legacy = AnalysisOptions {
            policy: FallbackPolicy::ForecastOnly,
            ..AnalysisOptions::default()
        };
        cache.get_or_load(&sources, &unified).unwrap();
        cache.get_or_load(&sources, &legacy).unwrap();
        let (_, fresh) = cache.get_or_load(&sources, &unified).unwrap();
        assert!(fresh);
        assert_eq!(cache.len(), 1);
    }
}
