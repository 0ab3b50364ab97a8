//! One-shot conversion in the calling process.

use tracing::error;

use crate::engine::{EngineAdapter, EngineProvider};
use crate::types::{exit_code, ConversionJob};

/// Initialize an engine, convert `job`, release the engine, and return the
/// exit code. Engine unavailability yields [`exit_code::UNAVAILABLE`]
/// without any conversion attempt.
///
/// The caller is expected to terminate the process right after this
/// returns; the engine is not trusted to survive an orderly shutdown.
pub async fn run(provider: &dyn EngineProvider, job: &ConversionJob) -> i32 {
    let mut adapter = match EngineAdapter::init(provider).await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("engine unavailable: {}", e);
            return exit_code::UNAVAILABLE;
        }
    };
    let code = adapter.convert(job).await;
    adapter.cleanup();
    code
}
