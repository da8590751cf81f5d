use async_trait::async_trait;
use planloop_core::human::HumanIo;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Asks on stdout and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioHuman;

#[async_trait]
impl HumanIo for StdioHuman {
    async fn input(&self, prompt: &str) -> anyhow::Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("{prompt}\n> ").as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            anyhow::bail!("stdin closed while waiting for an answer");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn message(&self, msg: &str) {
        println!("{msg}");
    }
}
