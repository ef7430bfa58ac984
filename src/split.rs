//! Train/test partitioning of the anchor pool
//!
//! A split is an immutable value tagged with the fingerprint of the
//! configuration and table it was generated for. The manager swaps whole
//! values, so a reader holding a split never sees a partial update.

use crate::config::{SplitConfig, SplitMethod};
use crate::error::{Result, WindowError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Which part of a split to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subset {
    Train,
    Test,
    /// Train and test together, ascending
    All,
}

/// Disjoint train/test anchor sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitIndices {
    /// Training anchors, ascending
    pub train: Vec<usize>,
    /// Test anchors, ascending
    pub test: Vec<usize>,
    /// Fingerprint of the configuration and table that produced the pool
    pub fingerprint: String,
    /// Incremented on every regeneration by the same manager
    pub version: u64,
    pub method: SplitMethod,
    pub train_fraction: f64,
    pub seed: u64,
}

impl SplitIndices {
    /// Partition an ascending anchor pool
    pub fn generate(
        pool: &[usize],
        config: &SplitConfig,
        fingerprint: impl Into<String>,
        version: u64,
    ) -> Result<Self> {
        if pool.is_empty() {
            return Err(WindowError::InsufficientData("empty anchor pool".to_string()));
        }
        if pool.windows(2).any(|w| w[0] >= w[1]) {
            return Err(WindowError::InvalidConfig(
                "anchor pool must be strictly ascending".to_string(),
            ));
        }
        if !(config.train_fraction > 0.0 && config.train_fraction < 1.0) {
            return Err(WindowError::InvalidConfig(format!(
                "train_fraction must lie in (0, 1), got {}",
                config.train_fraction
            )));
        }

        let n_train = ((pool.len() as f64) * config.train_fraction).round() as usize;
        let n_train = n_train.min(pool.len());

        let (mut train, mut test) = match config.method {
            SplitMethod::Sequential => (pool[..n_train].to_vec(), pool[n_train..].to_vec()),
            SplitMethod::Random => {
                let mut shuffled = pool.to_vec();
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
                shuffled.shuffle(&mut rng);
                let test = shuffled.split_off(n_train);
                (shuffled, test)
            }
        };
        train.sort_unstable();
        test.sort_unstable();

        Ok(Self {
            train,
            test,
            fingerprint: fingerprint.into(),
            version,
            method: config.method,
            train_fraction: config.train_fraction,
            seed: config.seed,
        })
    }

    /// Anchors of a subset, ascending
    pub fn indices(&self, subset: Subset) -> Vec<usize> {
        match subset {
            Subset::Train => self.train.clone(),
            Subset::Test => self.test.clone(),
            Subset::All => {
                let mut all = Vec::with_capacity(self.train.len() + self.test.len());
                all.extend_from_slice(&self.train);
                all.extend_from_slice(&self.test);
                all.sort_unstable();
                all
            }
        }
    }

    /// Check both subsets are strictly ascending and share no anchor
    pub fn validate(&self) -> Result<()> {
        for (name, set) in [("train", &self.train), ("test", &self.test)] {
            if let Some(w) = set.windows(2).find(|w| w[0] >= w[1]) {
                return Err(WindowError::InvalidConfig(format!(
                    "{} anchors must be strictly ascending ({} then {})",
                    name, w[0], w[1]
                )));
            }
        }

        // both sorted: merge walk
        let (mut i, mut j) = (0, 0);
        while i < self.train.len() && j < self.test.len() {
            match self.train[i].cmp(&self.test[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    return Err(WindowError::InvalidConfig(format!(
                        "anchor {} is in both train and test",
                        self.train[i]
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let split: Self = serde_json::from_str(json)?;
        split.validate()?;
        Ok(split)
    }

    /// Persist as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load a split persisted with [`SplitIndices::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let split: Self = serde_json::from_reader(reader)?;
        split.validate()?;
        Ok(split)
    }
}

/// Owner of the current split
#[derive(Debug, Default)]
pub struct SplitManager {
    current: Option<Arc<SplitIndices>>,
    generation: u64,
}

impl SplitManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current split, if any
    pub fn current(&self) -> Option<Arc<SplitIndices>> {
        self.current.clone()
    }

    /// Generate a new split from `pool` and replace the current one
    pub fn regenerate(
        &mut self,
        pool: &[usize],
        config: &SplitConfig,
        fingerprint: &str,
    ) -> Result<Arc<SplitIndices>> {
        let split = Arc::new(SplitIndices::generate(pool, config, fingerprint, self.generation + 1)?);

        info!(
            method = ?split.method,
            pool = pool.len(),
            train = split.train.len(),
            test = split.test.len(),
            version = split.version,
            "Generated train/test split"
        );

        self.generation = split.version;
        self.current = Some(Arc::clone(&split));
        Ok(split)
    }

    /// Install a previously persisted split
    pub fn adopt(&mut self, split: SplitIndices) -> Result<Arc<SplitIndices>> {
        split.validate()?;
        self.generation = self.generation.max(split.version);
        let split = Arc::new(split);
        self.current = Some(Arc::clone(&split));
        Ok(split)
    }

    /// Forget the current split
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Current split, checked against the active configuration
    pub fn checked(&self, fingerprint: &str) -> Result<Arc<SplitIndices>> {
        let split = self.current.as_ref().ok_or_else(|| {
            WindowError::InvalidConfig("no split has been generated".to_string())
        })?;

        if split.fingerprint != fingerprint {
            warn!(
                split = %split.fingerprint,
                current = %fingerprint,
                "Refusing split generated for a different configuration"
            );
            return Err(WindowError::StaleSplit {
                expected: split.fingerprint.clone(),
                actual: fingerprint.to_string(),
            });
        }
        Ok(Arc::clone(split))
    }

    /// Anchors of a subset of the current split
    pub fn indices_for(&self, subset: Subset, fingerprint: &str) -> Result<Vec<usize>> {
        Ok(self.checked(fingerprint)?.indices(subset))
    }
}
