//! # Capacity Flows
//!
//! A log with capacity 5 fed 10 events keeps the 5 most recent, with
//! their original serial numbers. Clearing never reuses serial numbers.

#[cfg(test)]
mod tests {
    use super::super::{within, Harness};
    use iw_runtime::InstallOptions;
    use serde_json::json;
    use shared_bus::RequesterBus;

    fn send_ticks(harness: &Harness, range: std::ops::Range<u64>) {
        let frame = harness.frame();
        for i in range {
            frame.send("app:tick", vec![json!(i)]);
        }
    }

    #[tokio::test]
    async fn test_window_keeps_most_recent() {
        let harness = Harness::installed(InstallOptions::default().with_log_capacity(5)).await;

        send_ticks(&harness, 0..10);

        let events = within(harness.events()).await;
        let serials: Vec<_> = events.iter().map(|e| e.serial_number).collect();
        let args: Vec<_> = events.iter().map(|e| e.event.args[0].clone()).collect();
        assert_eq!(serials, vec![5, 6, 7, 8, 9]);
        assert_eq!(args, (5..10).map(|i| json!(i)).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_serials_continue_after_clear() {
        let harness = Harness::installed(InstallOptions::default().with_log_capacity(5)).await;
        send_ticks(&harness, 0..3);

        harness.watch.clear_events();
        send_ticks(&harness, 3..4);

        let events = within(harness.events()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].serial_number, 3);
    }
}
