//! In-process transport double for unit tests.

use crate::domain::model::{FetchRequest, FetchResponse};
use crate::domain::ports::HttpTransport;
use crate::utils::error::{ClientError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type Hook = Box<dyn FnOnce() + Send>;

struct Step {
    outcome: Result<FetchResponse>,
    hook: Option<Hook>,
    delay: Option<Duration>,
}

impl Step {
    fn new(outcome: Result<FetchResponse>) -> Self {
        Self {
            outcome,
            hook: None,
            delay: None,
        }
    }
}

#[derive(Default)]
struct Script {
    outcomes: VecDeque<Step>,
    calls: Vec<(Instant, FetchRequest)>,
}

/// Replays queued outcomes in order and records when each send happened.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, response: FetchResponse) {
        self.script.lock().unwrap().outcomes.push_back(Step::new(Ok(response)));
    }

    /// The send stays in flight for `delay` before answering.
    pub fn push_ok_delayed(&self, response: FetchResponse, delay: Duration) {
        let mut step = Step::new(Ok(response));
        step.delay = Some(delay);
        self.script.lock().unwrap().outcomes.push_back(step);
    }

    pub fn push_err(&self, err: ClientError) {
        self.script.lock().unwrap().outcomes.push_back(Step::new(Err(err)));
    }

    /// Runs `hook` during the send, before the error is returned.
    pub fn push_err_after(&self, err: ClientError, hook: impl FnOnce() + Send + 'static) {
        self.script
            .lock()
            .unwrap()
            .outcomes
            .push_back(Step {
                outcome: Err(err),
                hook: Some(Box::new(hook)),
                delay: None,
            });
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    /// Time between consecutive sends.
    pub fn gaps(&self) -> Vec<Duration> {
        let script = self.script.lock().unwrap();
        script
            .calls
            .windows(2)
            .map(|pair| pair[1].0.duration_since(pair[0].0))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let step = {
            let mut script = self.script.lock().unwrap();
            script.calls.push((Instant::now(), request.clone()));
            script.outcomes.pop_front().unwrap_or_else(|| {
                Step::new(Err(ClientError::Network {
                    message: "script exhausted".to_string(),
                }))
            })
        };
        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(hook) = step.hook {
            hook();
        }
        step.outcome
    }
}
