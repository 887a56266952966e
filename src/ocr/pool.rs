//! Ownership and lifecycle of the three local OCR engines.
//!
//! The engines keep state between calls, so an image job takes the whole
//! set exclusively through [`EnginePool::acquire`]. Readiness checks and
//! recycling happen only inside `acquire`, i.e. between jobs, never in the
//! middle of one.

use image::GrayImage;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use super::{EngineFactory, EngineKind, Recognition, RecognitionEngine};
use crate::error::{ScoreError, ScoreResult};

struct EngineSet {
    latin: Box<dyn RecognitionEngine>,
    japanese: Box<dyn RecognitionEngine>,
    digits: Box<dyn RecognitionEngine>,
}

impl EngineSet {
    fn start(factory: &dyn EngineFactory) -> anyhow::Result<Self> {
        Ok(Self {
            latin: factory.start(EngineKind::Latin)?,
            japanese: factory.start(EngineKind::Japanese)?,
            digits: factory.start(EngineKind::Digits)?,
        })
    }

    fn get(&mut self, kind: EngineKind) -> &mut dyn RecognitionEngine {
        match kind {
            EngineKind::Latin => self.latin.as_mut(),
            EngineKind::Japanese => self.japanese.as_mut(),
            EngineKind::Digits => self.digits.as_mut(),
        }
    }

    fn shutdown(self) -> anyhow::Result<()> {
        // Stop all three even if one fails
        let results = [self.latin.shutdown(), self.japanese.shutdown(), self.digits.shutdown()];
        results.into_iter().collect::<anyhow::Result<Vec<()>>>()?;
        Ok(())
    }
}

#[derive(Default)]
struct PoolState {
    engines: Option<EngineSet>,
    /// Jobs finished since the engines were last started
    completed_jobs: u64,
    /// Number of times the engine set has been started
    generation: u64,
}

pub struct EnginePool {
    factory: Box<dyn EngineFactory>,
    quota: u64,
    state: Mutex<PoolState>,
}

impl EnginePool {
    /// `quota`: completed jobs after which the engines are restarted.
    pub fn new(factory: Box<dyn EngineFactory>, quota: u64) -> Self {
        Self {
            factory,
            quota,
            state: Mutex::new(PoolState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // A panic inside a job leaves the engines as they were; keep serving
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Takes exclusive use of the engines for one image job.
    ///
    /// Starts the engines if needed and recycles them once the quota of
    /// completed jobs has been exceeded. Dropping the guard ends the job.
    pub fn acquire(&self) -> ScoreResult<PoolGuard<'_>> {
        let mut state = self.lock();
        self.ensure_ready(&mut state)?;
        Ok(PoolGuard { state })
    }

    /// Tears down and restarts the engines, waiting for any running job to finish.
    pub fn recycle(&self) -> ScoreResult<()> {
        let mut state = self.lock();
        self.teardown(&mut state);
        self.ensure_ready(&mut state)
    }

    /// Jobs finished since the last (re)start.
    pub fn completed_jobs(&self) -> u64 {
        self.lock().completed_jobs
    }

    /// How many times the engine set has been started.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_ready(&self) -> bool {
        self.lock().engines.is_some()
    }

    fn ensure_ready(&self, state: &mut PoolState) -> ScoreResult<()> {
        if state.engines.is_some() && state.completed_jobs > self.quota {
            info!(
                "OCR engines completed {} jobs (quota {}), recycling",
                state.completed_jobs, self.quota
            );
            self.teardown(state);
        }

        if state.engines.is_none() {
            let engines = EngineSet::start(self.factory.as_ref()).map_err(ScoreError::engine)?;
            state.engines = Some(engines);
            state.completed_jobs = 0;
            state.generation += 1;
            info!("OCR engines ready (generation {})", state.generation);
        }

        Ok(())
    }

    fn teardown(&self, state: &mut PoolState) {
        if let Some(engines) = state.engines.take() {
            if let Err(e) = engines.shutdown() {
                warn!("OCR engine shutdown reported an error: {:#}", e);
            }
        }
        state.completed_jobs = 0;
    }
}

/// Exclusive access to the engine set for one image job.
pub struct PoolGuard<'a> {
    state: MutexGuard<'a, PoolState>,
}

impl PoolGuard<'_> {
    pub fn recognize(&mut self, kind: EngineKind, img: &GrayImage) -> ScoreResult<Recognition> {
        let engines = self
            .state
            .engines
            .as_mut()
            .ok_or_else(|| ScoreError::OcrEngine("engines are not running".to_string()))?;
        engines.get(kind).recognize(img).map_err(ScoreError::engine)
    }
}

impl Drop for PoolGuard<'_> {
    fn drop(&mut self) {
        self.state.completed_jobs += 1;
    }
}
