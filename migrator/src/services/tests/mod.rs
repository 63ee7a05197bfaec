//! Service-specific tests
//!
//! Each service has its own file. HTTP stores are simulated with wiremock and
//! ledgers write into temporary directories.

mod commerce_client;
mod job_runner;

// Common test utilities for services
pub mod common {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::traits::Sleeper;

    /// Sleeper that returns immediately and remembers what it was asked
    #[derive(Default)]
    pub struct RecordingSleeper {
        calls: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn calls(&self) -> Vec<Duration> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.calls.lock().unwrap().push(duration);
        }
    }
}
