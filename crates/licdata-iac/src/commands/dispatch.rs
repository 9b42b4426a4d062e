use super::output::Output;
use anyhow::Context;
use licdata_iac_core::{Event, StackOperationFactory};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Reads events from stdin and handles each request in arrival order
///
/// Events of unknown types and events that are not requests are skipped.
/// Requests run one at a time so a saga never contends for its own stack lock.
pub async fn handle(factory: &StackOperationFactory, output: &mut Output) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(event) = Event::from_json_line(line)
            .with_context(|| format!("Malformed event on line {}", line_no))?
        else {
            tracing::debug!("Line {}: unknown event type, skipped", line_no);
            continue;
        };

        match factory.dispatch(&event).await {
            Some(events) => output.emit_all(&events)?,
            None => tracing::debug!(
                "Line {}: {} needs no handling",
                line_no,
                event.kind().as_str()
            ),
        }
    }
    Ok(())
}
