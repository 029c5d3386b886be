use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub mod tracing;

const CLIENT_ID_SUFFIX_LENGTH: usize = 8;

/// Generate a client id unique to this process, e.g. `ultrafreezer-ingest-Xa83kQ0p`.
pub fn random_client_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CLIENT_ID_SUFFIX_LENGTH)
        .map(char::from)
        .collect();
    format!("{}-{}", prefix, suffix)
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns `false` if the sleep was cut short by cancellation.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_has_prefix_and_suffix() {
        let id = random_client_id("ultrafreezer-simulator");
        let suffix = id.strip_prefix("ultrafreezer-simulator-").unwrap();
        assert_eq!(suffix.len(), CLIENT_ID_SUFFIX_LENGTH);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancellation() {
        let cancel = CancellationToken::new();
        assert!(sleep_or_cancel(Duration::from_secs(10), &cancel).await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_cuts_sleep_short() {
        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        assert!(!sleep_or_cancel(Duration::from_secs(3600), &cancel).await);
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
