use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use crate::targets::TargetRepository;
use crate::throttle_logger::ThrottleSink;

/// In-memory repository. `None` makes every fetch fail
#[derive(Clone, Default)]
pub struct FakeRepository {
    records: Arc<Mutex<Option<HashMap<String, String>>>>,
}

impl FakeRepository {
    pub fn new(records: &[(&str, &str)]) -> Self {
        let repository = FakeRepository::default();
        repository.set(records.iter().map(|(domain, address)| (domain.to_string(), address.to_string())));
        repository
    }

    pub fn set(&self, records: impl IntoIterator<Item = (String, String)>) {
        *self.records.lock().unwrap() = Some(records.into_iter().collect());
    }

    pub fn fail(&self) {
        *self.records.lock().unwrap() = None;
    }
}

impl TargetRepository for FakeRepository {
    async fn get_targets_list(&self) -> anyhow::Result<HashMap<String, String>> {
        self.records
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("repository is unavailable"))
    }
}

/// Remembers every throttled client
#[derive(Clone, Default)]
pub struct RecordingSink {
    clients: Arc<Mutex<Vec<IpAddr>>>,
}

impl RecordingSink {
    pub fn clients(&self) -> Vec<IpAddr> {
        self.clients.lock().unwrap().clone()
    }
}

impl ThrottleSink for RecordingSink {
    fn log_throttle_request(&self, client: IpAddr) {
        self.clients.lock().unwrap().push(client);
    }
}
