//! Streaming executor.
//!
//! A compiled [`Request`] is run by a single producer task that re-opens the
//! source, skips the header, and pushes every matching, projected row into
//! a channel of capacity one. The consumer side is a [`RowStream`]: it
//! yields `Ok(row)` in file order, ends cleanly when the file is exhausted,
//! and yields one final `Err` when the scan was cancelled or failed.
//!
//! Cancellation is cooperative. The [`QueryContext`] is checked at every
//! line boundary, never in the middle of a line.

use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::clause::ClauseChain;
use crate::error::{QueryError, QueryResult};
use crate::predicate::evaluate;
use crate::request::{parse_header, split_line, Request};
use crate::result::{ResultSet, Row, Widths};

/// Deadline and cancellation for one request.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl QueryContext {
    /// No deadline; only explicit cancellation stops the scan.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancellationToken::new(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Token that cancels this request when triggered from elsewhere.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Non-blocking check used between lines.
    pub fn check(&self) -> QueryResult<()> {
        if self.token.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(QueryError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves once the request is cancelled or its deadline passes.
    pub async fn interrupted(&self) -> QueryError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => QueryError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => QueryError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                QueryError::Cancelled
            }
        }
    }
}

/// Rows produced by a running scan.
#[derive(Debug)]
pub struct RowStream {
    rx: mpsc::Receiver<QueryResult<Row>>,
    template: ResultSet,
}

impl RowStream {
    /// An empty result set with this scan's column maps. Its width
    /// tracking is shared with the producer.
    pub fn result_set(&self) -> ResultSet {
        self.template.clone()
    }
}

impl Stream for RowStream {
    type Item = QueryResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Rows collected by [`Request::execute`] together with how the scan ended.
/// Rows emitted before a cancellation or failure are kept.
#[derive(Debug)]
pub struct QueryOutcome {
    pub results: ResultSet,
    pub status: QueryResult<()>,
    pub elapsed: Duration,
}

impl QueryOutcome {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

impl Request {
    /// Open the source, read its header, and start the producer task.
    /// Must be called from within a tokio runtime.
    pub async fn stream(&self, ctx: &QueryContext, separator: char) -> QueryResult<RowStream> {
        let path = self.from().to_path_buf();
        let file = File::open(&path).await.map_err(|source| QueryError::Open {
            path: path.clone(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let header_line = next_line(&mut reader, &mut buf)
            .await
            .map_err(|source| QueryError::Read {
                path: path.clone(),
                source,
            })?
            .unwrap_or_default();
        let headers = parse_header(&header_line, separator);

        let template = ResultSet::new(self.select(), &self.filter_fields(), &headers);
        let scan = Scan {
            path,
            separator,
            chain: self.where_chain().cloned(),
            filter: indexed(template.filter_index().iter()),
            select: self
                .select()
                .iter()
                .map(|c| (c.clone(), template.select_index().get(c).copied()))
                .collect(),
            widths: template.widths().clone(),
        };

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(scan.run(reader, ctx.clone(), tx));

        Ok(RowStream { rx, template })
    }

    /// Run the request to completion, collecting every emitted row.
    pub async fn execute(&self, ctx: &QueryContext, separator: char) -> QueryOutcome {
        let started = Instant::now();

        let mut stream = match self.stream(ctx, separator).await {
            Ok(stream) => stream,
            Err(err) => {
                return QueryOutcome {
                    results: ResultSet::new(self.select(), &self.filter_fields(), &[]),
                    status: Err(err),
                    elapsed: started.elapsed(),
                }
            }
        };

        let mut results = stream.result_set();
        let mut status = Ok(());
        while let Some(item) = stream.next().await {
            match item {
                Ok(row) => results.push(row),
                Err(err) => {
                    status = Err(err);
                    break;
                }
            }
        }

        QueryOutcome {
            results,
            status,
            elapsed: started.elapsed(),
        }
    }
}

/// Next line without decoding errors: invalid UTF-8 becomes U+FFFD instead
/// of failing the scan. `None` at end of file.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

fn indexed<'a>(entries: impl Iterator<Item = (&'a String, &'a usize)>) -> Vec<(String, usize)> {
    entries.map(|(name, i)| (name.clone(), *i)).collect()
}

/// Everything the producer task owns.
struct Scan {
    path: PathBuf,
    separator: char,
    chain: Option<ClauseChain>,
    filter: Vec<(String, usize)>,
    select: Vec<(String, Option<usize>)>,
    widths: Widths,
}

impl Scan {
    async fn run(
        self,
        reader: BufReader<File>,
        ctx: QueryContext,
        tx: mpsc::Sender<QueryResult<Row>>,
    ) {
        tracing::debug!(path = %self.path.display(), "scan started");
        match self.scan(reader, &ctx, &tx).await {
            Ok(emitted) => {
                tracing::info!(path = %self.path.display(), rows = emitted, "scan finished");
            }
            Err(err) => {
                if err.is_cancellation() {
                    tracing::warn!(path = %self.path.display(), "scan stopped: {err}");
                } else {
                    tracing::error!(path = %self.path.display(), "scan failed: {err}");
                }
                let _ = tx.send(Err(err)).await;
            }
        }
    }

    async fn scan(
        &self,
        mut reader: BufReader<File>,
        ctx: &QueryContext,
        tx: &mpsc::Sender<QueryResult<Row>>,
    ) -> QueryResult<usize> {
        let mut emitted = 0;
        let mut buf = Vec::new();
        loop {
            if tx.is_closed() {
                tracing::debug!("row consumer dropped, stopping scan");
                return Ok(emitted);
            }
            ctx.check()?;

            let line = next_line(&mut reader, &mut buf)
                .await
                .map_err(|source| QueryError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            let Some(line) = line else {
                break;
            };

            let cells = split_line(&line, self.separator);
            if !self.matches(&cells) {
                continue;
            }

            let row = self.project(&cells);
            tokio::select! {
                biased;
                sent = tx.send(Ok(row)) => {
                    if sent.is_err() {
                        tracing::debug!("row consumer dropped, stopping scan");
                        return Ok(emitted);
                    }
                }
                err = ctx.interrupted() => return Err(err),
            }
            emitted += 1;
        }
        Ok(emitted)
    }

    /// Every referenced column must pass on its own.
    fn matches(&self, cells: &[&str]) -> bool {
        let Some(chain) = &self.chain else {
            return true;
        };
        self.filter.iter().all(|(field, i)| {
            let cell = cells.get(*i).copied().unwrap_or_default();
            evaluate(chain, field, cell)
        })
    }

    fn project(&self, cells: &[&str]) -> Row {
        self.select
            .iter()
            .map(|(column, i)| {
                let cell = i.and_then(|i| cells.get(i).copied()).unwrap_or_default();
                self.widths.observe(column, cell);
                (column.as_str(), cell)
            })
            .collect()
    }
}
