//! Feeds an input stream to the gateway.

use gw_service::Gateway;
use gw_types::ChannelId;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Read `reader` to the end, feeding each chunk to `gateway` on `channel`.
///
/// Chunks end at a newline, at `max_chunk` bytes or at the end of input, so
/// a stream without newlines is never buffered beyond `max_chunk`. Overflows
/// are logged and reading continues. Returns the number of fragments fed.
pub async fn pump<R>(
    reader: R,
    gateway: &Gateway,
    channel: &ChannelId,
    max_chunk: usize,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(max_chunk.max(1), reader);
    let mut fragments = 0;

    loop {
        let chunk = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            let len = available
                .iter()
                .position(|&b| b == b'\n')
                .map_or(available.len(), |idx| idx + 1);
            available[..len].to_vec()
        };
        reader.consume(chunk.len());

        fragments += 1;
        match gateway.feed(channel, &chunk).await {
            Ok(reports) => {
                for report in reports {
                    tracing::debug!(
                        "{}: provisioning {}, dispatch {:?}",
                        report.uid,
                        report.provisioning,
                        report.dispatch
                    );
                }
            }
            Err(e) => tracing::warn!("Input {}: {}", channel, e),
        }
    }

    tracing::info!("Input {} closed after {} fragments", channel, fragments);
    Ok(fragments)
}
