//! MCP server on stdin/stdout.
//!
//! One JSON-RPC message per line in, one response per line out. stdout is
//! reserved for protocol traffic; logs go to stderr.

use super::McpHandler;
use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Serve the protocol on the process's stdin/stdout until EOF.
pub async fn run(handler: McpHandler) -> Result<()> {
    info!("Serving MCP over stdio");
    serve(handler, tokio::io::stdin(), tokio::io::stdout()).await?;
    info!("stdin closed, shutting down");
    Ok(())
}

/// Serve the protocol over an arbitrary reader/writer pair.
///
/// Each message is handled on its own task, so a slow `tools/call` does not
/// hold up later requests. Responses are written in completion order by this
/// loop, which owns the writer. After EOF, in-flight requests still get
/// their responses.
pub async fn serve<R, W>(handler: McpHandler, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut in_flight = JoinSet::new();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line.context("Failed to read from input")? {
                    Some(line) => {
                        let message = line.trim().to_string();
                        if !message.is_empty() {
                            let handler = handler.clone();
                            in_flight.spawn(async move { handler.handle_message(&message).await });
                        }
                    }
                    None => input_open = false,
                }
            }
            Some(joined) = in_flight.join_next() => {
                match joined {
                    Ok(Some(response)) => write_line(&mut writer, &response).await?,
                    Ok(None) => {}
                    Err(e) => warn!("Request task failed: {}", e),
                }
            }
            else => break,
        }
    }

    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, response: &str) -> Result<()> {
    debug!("Sending response ({} bytes)", response.len());
    writer
        .write_all(response.as_bytes())
        .await
        .context("Failed to write response")?;
    writer.write_all(b"\n").await.context("Failed to write response")?;
    writer.flush().await.context("Failed to flush output")
}
