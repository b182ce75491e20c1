//! Scripted in-memory `Connection` for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

use crate::domain::traits::Connection;
use crate::domain::types::{MessageId, OutboundContent};

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: String,
    pub content: OutboundContent,
    pub at: Instant,
}

/// Records every send. Responses come from the script first, then from the fallback.
pub struct MockConnection {
    identity: Option<String>,
    script: Mutex<VecDeque<Result<(), String>>>,
    reply_error: Option<String>,
    exhausted_error: Option<String>,
    sent: Mutex<Vec<SentMessage>>,
}

impl MockConnection {
    /// Every send succeeds.
    pub fn new() -> Self {
        Self {
            identity: Some("@bot:example.org".to_string()),
            script: Mutex::new(VecDeque::new()),
            reply_error: None,
            exhausted_error: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every send fails with `error`.
    pub fn failing(error: &str) -> Self {
        Self {
            exhausted_error: Some(error.to_string()),
            ..Self::new()
        }
    }

    /// The first `times` sends fail with `error`, the rest succeed.
    pub fn fail_times(self, times: usize, error: &str) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            for _ in 0..times {
                script.push_back(Err(error.to_string()));
            }
        }
        self
    }

    /// Quoted replies always fail with `error`.
    pub fn fail_replies(mut self, error: &str) -> Self {
        self.reply_error = Some(error.to_string());
        self
    }

    pub fn with_identity(mut self, identity: Option<&str>) -> Self {
        self.identity = identity.map(str::to_string);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&self, recipient: &str, content: &OutboundContent) -> Result<MessageId, String> {
        let index = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(SentMessage {
                recipient: recipient.to_string(),
                content: content.clone(),
                at: Instant::now(),
            });
            sent.len()
        };

        if content.is_reply() {
            if let Some(error) = &self.reply_error {
                return Err(error.clone());
            }
        }

        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(Err(error)) => Err(error),
            Some(Ok(())) => Ok(format!("$event{index}")),
            None => match &self.exhausted_error {
                Some(error) => Err(error.clone()),
                None => Ok(format!("$event{index}")),
            },
        }
    }

    fn identity(&self) -> Option<String> {
        self.identity.clone()
    }
}
