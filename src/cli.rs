//! Interactive question loop used by `docqa chat`.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::chain::ConversationalChain;
use crate::history::ChatHistory;

pub const PROMPT: &str = "Ask a question (or 'exit'): ";

/// Reads questions line by line until `exit` (any case) or end of input.
///
/// Each answer is printed as `Answer: …`. A failed question is reported on
/// stderr and the loop carries on with the history unchanged.
pub async fn run_repl<R, W>(chain: &ConversationalChain, mut input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut history = ChatHistory::new();
    let mut line = String::new();

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            output.write_all(b"\n").await?;
            output.flush().await?;
            break;
        }
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match chain.answer(question, history.clone()).await {
            Ok((answer, updated)) => {
                history = updated;
                output
                    .write_all(format!("Answer: {}\n", answer).as_bytes())
                    .await?;
            }
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }
    Ok(())
}
