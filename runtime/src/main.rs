//! telemux - forward newline-delimited JSON events from stdin
//!
//! ```bash
//! TELEMUX_CONFIG=pipeline.json telemux < events.ndjson
//! ```

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemux_runtime::run(tokio::io::stdin()).await
}
