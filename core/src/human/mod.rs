//! Human-in-the-loop channel.

use async_trait::async_trait;

#[async_trait]
pub trait HumanIo: Send + Sync {
    /// Ask the human and wait for the answer.
    async fn input(&self, prompt: &str) -> anyhow::Result<String>;

    /// Show a message. Never blocks the loop.
    fn message(&self, msg: &str);
}
