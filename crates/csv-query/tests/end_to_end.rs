//! End-to-end requests against the OWID-shaped fixture.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use csv_query::{CompileError, QueryContext, QueryError, Request, Row};
use tokio_stream::StreamExt;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/covid.csv")
}

fn compile(template: &str) -> Request {
    let raw = template.replace("{file}", &fixture().display().to_string());
    Request::compile(&raw, ',').unwrap()
}

fn row(cells: &[(&str, &str)]) -> Row {
    cells.iter().copied().collect()
}

#[tokio::test]
async fn test_range_query_over_two_countries() {
    let req = compile(
        "
        SELECT location, new_cases, date
        FROM {file}
        WHERE location = Russia OR location = Ukraine AND date >= 2020-04-20 AND date <= 2020-04-30
        AND date NOT 2020-04-23 AND new_cases > 500 AND new_cases < 5500;
        ",
    );

    let outcome = req.execute(&QueryContext::new(), ',').await;
    assert!(outcome.is_ok());

    let results = &outcome.results;
    assert_eq!(results.select_index().get("location"), Some(&2));
    assert_eq!(results.select_index().get("date"), Some(&3));
    assert_eq!(results.select_index().get("new_cases"), Some(&5));
    assert_eq!(results.filter_index(), results.select_index());

    assert_eq!(results.widths().get("date"), 10);
    assert_eq!(results.widths().get("location"), 8);
    assert_eq!(results.widths().get("new_cases"), 9);

    assert_eq!(
        results.rows(),
        &[
            row(&[("date", "2020-04-20"), ("location", "Russia"), ("new_cases", "4268.0")]),
            row(&[("date", "2020-04-22"), ("location", "Russia"), ("new_cases", "5236.0")]),
            row(&[("date", "2020-04-30"), ("location", "Ukraine"), ("new_cases", "540.0")]),
        ]
    );
}

#[tokio::test]
async fn test_single_country_threshold() {
    let req = compile("SELECT date FROM {file} WHERE location=Russia AND new_cases>5000;");
    let outcome = req.execute(&QueryContext::new(), ',').await;

    let dates: Vec<_> = outcome
        .results
        .rows()
        .iter()
        .filter_map(|r| r.get("date"))
        .collect();
    assert_eq!(dates, vec!["2020-04-19", "2020-04-21", "2020-04-22", "2020-05-01"]);
}

#[tokio::test]
async fn test_multi_word_location() {
    let req = compile("SELECT location, date FROM {file} WHERE location = united arab emirates");
    let outcome = req.execute(&QueryContext::new(), ',').await;

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results.rows()[0].get("location"), Some("United Arab Emirates"));
    assert_eq!(outcome.results.widths().get("location"), 20);
}

#[tokio::test]
async fn test_select_star_without_where() {
    let req = compile("SELECT * FROM {file}");
    assert_eq!(req.select().len(), 8);

    let outcome = req.execute(&QueryContext::new(), ',').await;
    assert!(outcome.is_ok());
    assert_eq!(outcome.results.len(), 14);
    assert_eq!(outcome.results.rows()[13].get("continent"), Some(""));
}

#[tokio::test]
async fn test_nothing_matches() {
    let req = compile("SELECT location FROM {file} WHERE location=Atlantis");
    let outcome = req.execute(&QueryContext::new(), ',').await;
    assert!(outcome.is_ok());
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn test_unknown_filter_column() {
    let raw = format!("SELECT location FROM {} WHERE country=Russia", fixture().display());
    let err = Request::compile(&raw, ',').unwrap_err();
    assert!(matches!(err, CompileError::UnknownFiltered { ref column, .. } if column == "country"));
}

#[tokio::test]
async fn test_expired_deadline() {
    let req = compile("SELECT location FROM {file} WHERE new_cases > 0;");
    let ctx = QueryContext::with_timeout(Duration::ZERO);
    let outcome = req.execute(&ctx, ',').await;

    assert!(matches!(outcome.status, Err(QueryError::DeadlineExceeded)));
    assert!(outcome.status.as_ref().unwrap_err().is_cancellation());
}

#[tokio::test]
async fn test_cancel_mid_stream_keeps_partial_rows() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "id,value").unwrap();
    for i in 0..10_000 {
        writeln!(file, "{i},{}", i % 7).unwrap();
    }
    file.flush().unwrap();

    let raw = format!("SELECT id FROM {} WHERE value>=0", file.path().display());
    let req = Request::compile(&raw, ',').unwrap();
    let ctx = QueryContext::new();
    let mut stream = req.stream(&ctx, ',').await.unwrap();

    let mut rows = Vec::new();
    for _ in 0..3 {
        match stream.next().await {
            Some(Ok(row)) => rows.push(row),
            other => panic!("unexpected item: {other:?}"),
        }
    }
    ctx.cancel();

    let mut terminal = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(row) => rows.push(row),
            Err(err) => terminal = Some(err),
        }
    }

    assert!(matches!(terminal, Some(QueryError::Cancelled)));
    assert!(rows.len() < 10_000);
    // rows arrive in file order
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.get("id"), Some(i.to_string().as_str()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_slow_consumption() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "id,value").unwrap();
    for i in 0..100 {
        writeln!(file, "{i},1").unwrap();
    }
    file.flush().unwrap();

    let raw = format!("SELECT id FROM {} WHERE value=1", file.path().display());
    let req = Request::compile(&raw, ',').unwrap();
    let ctx = QueryContext::with_timeout(Duration::from_secs(10));
    let mut stream = req.stream(&ctx, ',').await.unwrap();

    let mut rows = Vec::new();
    let mut terminal = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(row) => rows.push(row),
            Err(err) => terminal = Some(err),
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    assert!(matches!(terminal, Some(QueryError::DeadlineExceeded)));
    assert!(!rows.is_empty());
    assert!(rows.len() < 100, "got {} rows", rows.len());
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.get("id"), Some(i.to_string().as_str()));
    }
}

#[tokio::test]
async fn test_dropping_stream_stops_producer() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let mut contents = String::from("id,value\n0,1\n");
    for i in 1..500_000 {
        contents.push_str(&format!("{i},0\n"));
    }
    file.write_all(contents.as_bytes()).unwrap();

    let metrics = tokio::runtime::Handle::current().metrics();
    assert_eq!(metrics.num_alive_tasks(), 0);

    let raw = format!("SELECT id FROM {} WHERE value=1", file.path().display());
    let req = Request::compile(&raw, ',').unwrap();
    let mut stream = req.stream(&QueryContext::new(), ',').await.unwrap();
    assert!(matches!(stream.next().await, Some(Ok(_))));
    drop(stream);

    let stopped = tokio::time::timeout(Duration::from_secs(5), async {
        while metrics.num_alive_tasks() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(stopped.is_ok(), "producer still running after the stream was dropped");
}
