//! Interactive confirmation used by the review gate.

use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::Result;

/// Asks the operator a yes/no question. Only consulted when a stack upsert
/// runs with the `review` option set.
#[async_trait::async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, message: &str) -> Result<bool>;
}

/// Prompts on the controlling terminal; anything other than `y`/`yes`
/// counts as a rejection.
pub struct TerminalConfirm;

#[async_trait::async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, message: &str) -> Result<bool> {
        let mut out = stdout();
        out.write_all(format!("{message}\nApply these changes? [y/N] ").as_bytes())
            .await?;
        out.flush().await?;

        let mut answer = String::new();
        BufReader::new(stdin()).read_line(&mut answer).await?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}
