use async_trait::async_trait;

/// Secondary current sensor on the home mains, used to enrich samples with
/// the household draw for net metering. Entirely optional; the bridge works
/// without one.
#[async_trait]
pub trait Ammeter: Send {
    /// Current draw in ampere, `None` when the sensor is offline.
    async fn read_current(&mut self) -> Option<f64>;
}
