//! Dataset façade wiring tables, windowing, splitting and deindexification

use crate::config::WindowConfig;
use crate::data::{Scaler, ScalerType, TableSource, TimeTable};
use crate::deindex::{DeindexOptions, DeindexedFrame, Deindexifier};
use crate::error::{Result, WindowError};
use crate::split::{SplitIndices, SplitManager, Subset};
use crate::windowing::{Eligibility, IntervalSet, RowBounds, TensorBuilder, WindowedExamples};
use ndarray::Array3;
use std::sync::Arc;
use tracing::info;

/// Everything derived from one (table, configuration) pair
struct Resolved {
    table: Arc<TimeTable>,
    scaler: Option<Scaler>,
    eligibility: Eligibility,
    builder: TensorBuilder,
    fingerprint: String,
}

impl Resolved {
    fn new(raw: &TimeTable, config: &WindowConfig) -> Result<Self> {
        let (table, scaler) = match config.scaler {
            ScalerType::None => (raw.clone(), None),
            kind => {
                let mut scaler = Scaler::new(kind);
                let scaled = scaler.fit_transform(raw)?;
                (scaled, Some(scaler))
            }
        };

        let eligibility =
            IntervalSet::from_config(config.intervals.as_deref()).resolve(table.len())?;
        let builder = TensorBuilder::new(&table, config)?;
        let fingerprint = config.fingerprint(raw)?;

        Ok(Self {
            table: Arc::new(table),
            scaler,
            eligibility,
            builder,
            fingerprint,
        })
    }
}

/// A windowed view of one table under one configuration.
///
/// Changing the table or the intervals rebuilds every derived piece before
/// anything is replaced and discards the current split, so tensors are never
/// built from a split generated for other data.
pub struct SequenceDataset {
    raw: Arc<TimeTable>,
    config: WindowConfig,
    resolved: Resolved,
    splits: SplitManager,
}

impl SequenceDataset {
    /// Validate the configuration against `table`
    pub fn new(table: TimeTable, config: WindowConfig) -> Result<Self> {
        config.validate()?;
        let resolved = Resolved::new(&table, &config)?;
        Ok(Self {
            raw: Arc::new(table),
            config,
            resolved,
            splits: SplitManager::new(),
        })
    }

    /// Load the table from a source first
    pub fn from_source(source: &dyn TableSource, config: WindowConfig) -> Result<Self> {
        Self::new(source.load()?, config)
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Table as supplied, before scaling
    pub fn table(&self) -> &TimeTable {
        &self.raw
    }

    /// Table the windows are gathered from
    pub fn windowed_table(&self) -> &TimeTable {
        &self.resolved.table
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.resolved.scaler.as_ref()
    }

    pub fn eligibility(&self) -> &Eligibility {
        &self.resolved.eligibility
    }

    /// Fingerprint of the active configuration and table
    pub fn fingerprint(&self) -> &str {
        &self.resolved.fingerprint
    }

    /// Valid anchors within `bounds`, ascending
    pub fn anchors(&self, bounds: RowBounds) -> Result<Vec<usize>> {
        self.resolved
            .builder
            .indexer()
            .anchors(&self.resolved.eligibility, bounds)
    }

    /// Examples for every valid anchor within `bounds`
    pub fn examples(&self, bounds: RowBounds) -> Result<WindowedExamples> {
        let anchors = self.anchors(bounds)?;
        self.data_for(&anchors)
    }

    /// Examples for explicit anchors, in the given order
    pub fn data_for(&self, anchors: &[usize]) -> Result<WindowedExamples> {
        self.resolved
            .builder
            .build(&self.resolved.table, &self.resolved.eligibility, anchors)
    }

    /// Partition the full anchor pool and store the result
    pub fn generate_split(&mut self) -> Result<Arc<SplitIndices>> {
        let pool = self.anchors(RowBounds::all())?;
        self.splits
            .regenerate(&pool, &self.config.split, &self.resolved.fingerprint)
    }

    /// Current split, if one was generated or adopted
    pub fn split(&self) -> Option<Arc<SplitIndices>> {
        self.splits.current()
    }

    /// Install a persisted split generated for this configuration and table
    pub fn adopt_split(&mut self, split: SplitIndices) -> Result<()> {
        if split.fingerprint != self.resolved.fingerprint {
            return Err(WindowError::StaleSplit {
                expected: split.fingerprint,
                actual: self.resolved.fingerprint.clone(),
            });
        }
        self.splits.adopt(split)?;
        Ok(())
    }

    /// Training examples of the current split
    pub fn train_data(&self) -> Result<WindowedExamples> {
        self.subset_data(Subset::Train)
    }

    /// Test examples of the current split
    pub fn test_data(&self) -> Result<WindowedExamples> {
        self.subset_data(Subset::Test)
    }

    /// Examples of a subset, truncated to whole batches when configured
    pub fn subset_data(&self, subset: Subset) -> Result<WindowedExamples> {
        let anchors = self.splits.indices_for(subset, &self.resolved.fingerprint)?;
        let examples = self.data_for(&anchors)?;
        match self.config.batch_size {
            Some(batch_size) => examples.truncate_to_batches(batch_size),
            None => Ok(examples),
        }
    }

    /// Deindexifier over the active table, reporting original units
    pub fn deindexifier(&self) -> Deindexifier<'_> {
        let deindexifier = Deindexifier::new(
            &self.resolved.table,
            &self.resolved.eligibility,
            &self.config,
        );
        match &self.resolved.scaler {
            Some(scaler) => deindexifier.with_scaler(scaler),
            None => deindexifier,
        }
    }

    /// See [`Deindexifier::deindexify`]
    pub fn deindexify(
        &self,
        inputs: Option<&Array3<f64>>,
        outputs: Option<&Array3<f64>>,
        anchors: &[usize],
        options: DeindexOptions,
    ) -> Result<DeindexedFrame> {
        self.deindexifier().deindexify(inputs, outputs, anchors, options)
    }

    /// Replace the eligible intervals; the current split is discarded
    pub fn set_intervals(&mut self, intervals: Option<Vec<(usize, usize)>>) -> Result<()> {
        let mut config = self.config.clone();
        config.intervals = intervals;
        self.reconfigure(Arc::clone(&self.raw), config)
    }

    /// Replace the table; the current split is discarded
    pub fn set_table(&mut self, table: TimeTable) -> Result<()> {
        self.reconfigure(Arc::new(table), self.config.clone())
    }

    fn reconfigure(&mut self, raw: Arc<TimeTable>, config: WindowConfig) -> Result<()> {
        config.validate()?;
        let resolved = Resolved::new(&raw, &config)?;

        if self.splits.current().is_some() {
            info!(
                previous = %self.resolved.fingerprint,
                current = %resolved.fingerprint,
                "Discarding split after reconfiguration"
            );
        }

        self.raw = raw;
        self.config = config;
        self.resolved = resolved;
        self.splits.clear();
        Ok(())
    }
}
