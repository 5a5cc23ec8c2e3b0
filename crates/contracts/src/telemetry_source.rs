//! TelemetrySource trait - Telemetry data source abstraction
//!
//! Decouples the ingestion pipeline from where ticks come from: recorded
//! JSON-lines files, synthetic scenarios, or a live telematics feed.

use std::sync::Arc;

use crate::TelemetryTick;

/// Telemetry callback type
///
/// Sources push every produced `TelemetryTick` through this callback.
pub type TelemetryCallback = Arc<dyn Fn(TelemetryTick) + Send + Sync>;

/// Telemetry data source trait
///
/// # Example
///
/// ```ignore
/// let source: Box<dyn TelemetrySource> = get_source();
/// source.listen(Arc::new(|tick| {
///     println!("tick from {}", tick.vehicle_id);
/// }));
/// // ...
/// source.stop();
/// ```
pub trait TelemetrySource: Send + Sync {
    /// Source identifier (used for logging/metrics)
    fn source_id(&self) -> &str;

    /// Register data callback and start producing
    ///
    /// Repeated calls while listening are ignored.
    fn listen(&self, callback: TelemetryCallback);

    /// Stop producing
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;

    /// Whether the source has produced everything it will produce
    ///
    /// Live sources never finish.
    fn is_finished(&self) -> bool {
        false
    }
}
