//! Binary entrypoint: read one GroupingRequest from stdin, write one JSON
//! object to stdout.
//!
//! Output is either a GroupingResponse or, when the request is malformed, an
//! ErrorOutput (and exit status 1). Logs go to stderr; set RUST_LOG to tune.

use std::io::{self, Read, Write};

use grouping_engine::types::ErrorOutput;
use grouping_engine::{EngineError, GroupingRequest};
use tracing_subscriber::EnvFilter;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
    .with_writer(io::stderr)
    .init();

  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  let code = match handle(io::stdin().lock()) {
    Ok(body) => {
      let _ = out.write_all(body.as_bytes());
      0
    }
    Err(e) => {
      tracing::error!(error = %e, "request failed");
      let err = match &e {
        EngineError::Validation { field, reason } => {
          ErrorOutput::new(reason.clone()).with_field(field.clone())
        }
        _ => ErrorOutput::new(e.to_string()),
      };
      let _ = serde_json::to_writer(&mut out, &err);
      1
    }
  };
  let _ = writeln!(out);
  let _ = out.flush();
  drop(out);
  std::process::exit(code);
}

fn handle(mut input: impl Read) -> Result<String, EngineError> {
  let mut raw = String::new();
  input
    .read_to_string(&mut raw)
    .map_err(|e| EngineError::validation("stdin", &e.to_string()))?;
  let request: GroupingRequest = serde_json::from_str(&raw)?;
  let response = grouping_engine::run(&request)?;
  Ok(serde_json::to_string(&response)?)
}
