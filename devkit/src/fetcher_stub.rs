/*!
Stub ScriptFetcher: scripts distants servis depuis la mémoire

Une URL sans réponse enregistrée renvoie `FetchError::NotFound`.
*/

use async_trait::async_trait;
use golem_host::scripts::{FetchError, ScriptFetcher};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct StubFetcher {
    responses: Arc<Mutex<HashMap<String, Result<String, FetchError>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: &str) -> &Self {
        self.responses.lock().unwrap().insert(url.to_string(), Ok(body.to_string()));
        self
    }

    /// Simule une erreur réseau (connexion refusée, DNS...)
    pub fn unreachable(&self, url: &str) -> &Self {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            Err(FetchError::Transport {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        );
        self
    }

    pub fn status(&self, url: &str, status: u16) -> &Self {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            Err(FetchError::Status { url: url.to_string(), status }),
        );
        self
    }

    /// URLs demandées, dans l'ordre
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound { url: url.to_string() }))
    }
}
