//! LogSink - logs estimate summaries via tracing

use contracts::{ContractError, DataSink, FuelEstimate, RecoveryAction};
use tracing::{info, instrument, warn};

/// Sink that logs one line per estimate; alerts go out at `warn`
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_estimate(&self, estimate: &FuelEstimate) {
        if let Some(flag) = &estimate.theft_flag {
            warn!(
                sink = %self.name,
                vehicle_id = %estimate.vehicle_id,
                timestamp = estimate.timestamp,
                drift_pct = flag.drift_pct,
                gallons_lost = flag.estimated_gallons_lost,
                "Possible fuel theft"
            );
        }
        if estimate.recovery == RecoveryAction::EmergencyReset || estimate.sensor_escalation {
            warn!(
                sink = %self.name,
                vehicle_id = %estimate.vehicle_id,
                recovery = estimate.recovery.as_str(),
                escalation = estimate.sensor_escalation,
                "Estimator recovery"
            );
        }

        info!(
            sink = %self.name,
            vehicle_id = %estimate.vehicle_id,
            timestamp = estimate.timestamp,
            level_pct = estimate.level_pct,
            drift_pct = estimate.drift_pct,
            state = estimate.operating_state.as_str(),
            anchor = estimate.anchor_event.as_ref().map(|a| a.kind()),
            "FuelEstimate"
        );
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, estimate),
        fields(sink = %self.name, vehicle_id = %estimate.vehicle_id)
    )]
    async fn write(&mut self, estimate: &FuelEstimate) -> Result<(), ContractError> {
        self.log_estimate(estimate);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
