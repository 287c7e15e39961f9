//! One-shot query running, shared by the REPL and the `query` command.

use std::time::Duration;

use csv_query::{CompileError, QueryContext, QueryError, Request};

use crate::config::Config;
use crate::presenter::render_table;

pub const DEADLINE_HINT: &str =
    "deadline exceeded, try to increase the processing time in config file or specify the request";

/// What a finished request produced.
#[derive(Debug)]
pub struct QueryReport {
    /// Rendered table of whatever rows were collected.
    pub table: String,
    pub rows: usize,
    pub elapsed: Duration,
    /// Set when the scan stopped early or failed.
    pub error: Option<QueryError>,
}

impl QueryReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// User-facing description of the error, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(describe)
    }
}

pub fn describe(err: &QueryError) -> String {
    match err {
        QueryError::DeadlineExceeded => DEADLINE_HINT.to_string(),
        QueryError::Cancelled => "request cancelled".to_string(),
        other => format!("error during request: {other}"),
    }
}

/// Compile and execute `raw` under `ctx`.
pub async fn run(raw: &str, config: &Config, ctx: &QueryContext) -> Result<QueryReport, CompileError> {
    tracing::info!(request = raw.trim(), "user request");

    let request = Request::compile(raw, config.separator).map_err(|err| {
        tracing::error!("error: {err}");
        err
    })?;

    let outcome = request.execute(ctx, config.separator).await;
    let error = outcome.status.err();
    match &error {
        Some(QueryError::DeadlineExceeded) => tracing::error!("{DEADLINE_HINT}"),
        Some(QueryError::Cancelled) => tracing::error!("request cancelled by user"),
        Some(err) => tracing::error!("error during request: {err}"),
        None => {}
    }

    let results = outcome.results;
    Ok(QueryReport {
        table: render_table(results.columns(), &results.widths().snapshot(), results.rows()),
        rows: results.len(),
        elapsed: outcome.elapsed,
        error,
    })
}

/// Like [`run`] with the configured timeout, cancelled on Ctrl+C.
pub async fn run_interruptible(raw: &str, config: &Config) -> Result<QueryReport, CompileError> {
    let ctx = QueryContext::with_timeout(config.request_timeout);
    let token = ctx.token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let report = run(raw, config, &ctx).await;
    watcher.abort();
    report
}
