//! Interactive table view driven by line input.
//!
//! Plain lines are filter terms and go through a [`Debouncer`], so a burst of
//! edits re-renders once. `:r` re-fetches through a [`Throttle`], so repeated
//! refreshes inside the window are dropped.

use crate::core::dashboard::DashboardClient;
use crate::core::output::{write_page, OutputFormat};
use crate::core::rate_limit::{Debouncer, Throttle};
use crate::core::table::TableQuery;
use crate::domain::model::Record;
use crate::domain::ports::HttpTransport;
use crate::utils::error::{ClientError, Result};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Refresh,
    NextPage,
    PrevPage,
    Sort(String),
    Filter(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    match line {
        ":q" | ":quit" => Command::Quit,
        ":r" | ":refresh" => Command::Refresh,
        ":n" | ":next" => Command::NextPage,
        ":p" | ":prev" => Command::PrevPage,
        _ => match line.strip_prefix(":s ") {
            Some(column) => Command::Sort(column.trim().to_string()),
            None => Command::Filter(line.to_string()),
        },
    }
}

#[derive(Debug)]
enum SessionEvent {
    Filter(String),
    Refresh,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub debounce_wait: Duration,
    pub throttle_limit: Duration,
    pub filter_key: String,
    pub format: OutputFormat,
}

pub struct TableSession<'a, T: HttpTransport> {
    client: &'a DashboardClient<T>,
    path: String,
    query: TableQuery,
    records: Vec<Record>,
    debouncer: Debouncer,
    settings: SessionSettings,
    abort: CancellationToken,
}

impl<'a, T: HttpTransport> TableSession<'a, T> {
    pub fn new(
        client: &'a DashboardClient<T>,
        path: impl Into<String>,
        query: TableQuery,
        settings: SessionSettings,
    ) -> Self {
        Self {
            client,
            path: path.into(),
            query,
            records: Vec::new(),
            debouncer: Debouncer::new(),
            settings,
            abort: CancellationToken::new(),
        }
    }

    /// Ends `run` with [`ClientError::Aborted`] once `token` fires, even
    /// while waiting on input.
    pub fn with_abort_signal(mut self, token: CancellationToken) -> Self {
        self.abort = token;
        self
    }

    pub fn query(&self) -> &TableQuery {
        &self.query
    }

    async fn reload(&mut self) -> Result<()> {
        self.records = self.client.fetch_records(&self.path).await?;
        Ok(())
    }

    fn render<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let page = self.query.apply(self.records.clone())?;
        self.query.page = page.page;
        write_page(&page, self.settings.format, out)?;
        out.flush()?;
        Ok(())
    }

    /// Runs until `:q`, until input ends and nothing is left pending, or
    /// until the abort signal fires. A failed refresh keeps the rows already
    /// loaded.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let (tx, mut events) = mpsc::unbounded_channel();
        let filter_key = self.settings.filter_key.clone();

        let filter_tx = tx.clone();
        let apply_filter = self.debouncer.debounce(
            filter_key.clone(),
            self.settings.debounce_wait,
            move |term: String| {
                let _ = filter_tx.send(SessionEvent::Filter(term));
            },
        );
        let refresh = Throttle::new(self.settings.throttle_limit, move |()| {
            let _ = tx.send(SessionEvent::Refresh);
        });

        self.reload().await?;
        self.render(out)?;

        let mut lines = input.lines();
        let mut input_open = true;
        let mut interrupted = false;
        let abort = self.abort.clone();

        loop {
            tokio::select! {
                _ = abort.cancelled() => {
                    interrupted = true;
                    break;
                }
                line = lines.next_line(), if input_open => match line? {
                    Some(line) => match parse_command(&line) {
                        Command::Quit => break,
                        Command::Refresh => {
                            if !refresh.call(()) {
                                tracing::debug!("Refresh throttled");
                            }
                        }
                        Command::NextPage => {
                            self.query.page += 1;
                            self.render(out)?;
                        }
                        Command::PrevPage => {
                            self.query.page = self.query.page.saturating_sub(1).max(1);
                            self.render(out)?;
                        }
                        Command::Sort(column) => {
                            self.query.toggle_sort(&column);
                            self.render(out)?;
                        }
                        Command::Filter(term) => apply_filter.call(term),
                    },
                    None => input_open = false,
                },
                Some(event) = events.recv() => {
                    match event {
                        SessionEvent::Filter(term) => {
                            tracing::debug!(filter = %term, "Applying filter");
                            self.query.filter = (!term.is_empty()).then_some(term);
                            self.query.page = 1;
                        }
                        SessionEvent::Refresh => match self.reload().await {
                            Ok(()) => {}
                            Err(e) if e.is_abort() => {
                                interrupted = true;
                                break;
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Refresh failed, keeping previous rows");
                            }
                        },
                    }
                    self.render(out)?;
                }
            }

            if !input_open && !self.debouncer.is_pending(&filter_key) && events.is_empty() {
                break;
            }
        }

        self.debouncer.clear();
        if interrupted {
            tracing::info!("Session interrupted");
            return Err(ClientError::Aborted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryPolicy;
    use crate::domain::model::FetchResponse;
    use crate::testing::ScriptedTransport;
    use serde_json::Value;

    const ROWS: &str = r#"[
        {"cve_id": "CVE-1", "vendor": "Acme", "cvss": 9.8},
        {"cve_id": "CVE-2", "vendor": "Globex", "cvss": 5.3},
        {"cve_id": "CVE-3", "vendor": "acme labs", "cvss": 7.0}
    ]"#;

    fn settings() -> SessionSettings {
        SessionSettings {
            debounce_wait: Duration::from_millis(100),
            throttle_limit: Duration::from_secs(1),
            filter_key: "filter".to_string(),
            format: OutputFormat::Json,
        }
    }

    fn renders(out: &[u8]) -> Vec<Value> {
        serde_json::Deserializer::from_slice(out)
            .into_iter::<Value>()
            .map(|v| v.unwrap())
            .collect()
    }

    fn ids(render: &Value) -> Vec<&str> {
        render["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["cve_id"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(" :q "), Command::Quit);
        assert_eq!(parse_command(":r"), Command::Refresh);
        assert_eq!(parse_command(":s cvss"), Command::Sort("cvss".to_string()));
        assert_eq!(parse_command("openssl"), Command::Filter("openssl".to_string()));
        assert_eq!(parse_command(""), Command::Filter(String::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_debounces_filters_and_throttles_refresh() {
        let transport = ScriptedTransport::new();
        transport.push_ok(FetchResponse::new(200, ROWS));
        transport.push_ok(FetchResponse::new(200, ROWS));
        let client = DashboardClient::new("http://dashboard.local", transport.clone(), RetryPolicy::default());

        let mut session = TableSession::new(&client, "/api/vulnerabilities", TableQuery::new(), settings());
        let input: &[u8] = b"a\nac\nacme\n:s cvss\n:r\n:r\n";
        let mut out = Vec::new();
        session.run(input, &mut out).await.unwrap();

        // Initial load plus one refresh; the second :r fell inside the window.
        assert_eq!(transport.call_count(), 2);

        let renders = renders(&out);
        // initial, sort, refresh, one debounced filter
        assert_eq!(renders.len(), 4);
        assert_eq!(ids(renders.last().unwrap()), vec!["CVE-3", "CVE-1"]);
        assert_eq!(session.query().filter.as_deref(), Some("acme"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_rows() {
        let transport = ScriptedTransport::new();
        transport.push_ok(FetchResponse::new(200, ROWS));
        for _ in 0..3 {
            transport.push_ok(FetchResponse::new(503, "maintenance"));
        }
        let client = DashboardClient::new("http://dashboard.local", transport.clone(), RetryPolicy::default());

        let mut session = TableSession::new(&client, "/api/vulnerabilities", TableQuery::new(), settings());
        let input: &[u8] = b":r\n";
        let mut out = Vec::new();
        session.run(input, &mut out).await.unwrap();

        assert_eq!(transport.call_count(), 4);
        let renders = renders(&out);
        assert_eq!(renders.len(), 2);
        assert_eq!(ids(&renders[1]), vec!["CVE-1", "CVE-2", "CVE-3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_ends_session_waiting_on_input() {
        let transport = ScriptedTransport::new();
        transport.push_ok(FetchResponse::new(200, ROWS));
        let client = DashboardClient::new("http://dashboard.local", transport.clone(), RetryPolicy::default());

        let token = CancellationToken::new();
        let mut session = TableSession::new(&client, "/api/vulnerabilities", TableQuery::new(), settings())
            .with_abort_signal(token.clone());

        // The writer half stays open, so input never ends on its own.
        let (_keyboard, stdin) = tokio::io::duplex(64);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            token.cancel();
        });

        let mut out = Vec::new();
        let err = session
            .run(tokio::io::BufReader::new(stdin), &mut out)
            .await
            .unwrap_err();

        assert!(err.is_abort());
        assert_eq!(renders(&out).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_pages_and_quits() {
        let transport = ScriptedTransport::new();
        transport.push_ok(FetchResponse::new(200, ROWS));
        let client = DashboardClient::new("http://dashboard.local", transport.clone(), RetryPolicy::default());

        let query = TableQuery::new().page_size(2).sorted_by("cve_id", crate::domain::model::SortDirection::Ascending);
        let mut session = TableSession::new(&client, "/api/vulnerabilities", query, settings());
        let input: &[u8] = b":n\n:n\n:p\n:q\nignored\n";
        let mut out = Vec::new();
        session.run(input, &mut out).await.unwrap();

        let renders = renders(&out);
        assert_eq!(renders.len(), 4);
        assert_eq!(ids(&renders[1]), vec!["CVE-3"]);
        // Paging past the end stays on the last page.
        assert_eq!(renders[2]["page"], 2);
        assert_eq!(ids(&renders[3]), vec!["CVE-1", "CVE-2"]);
        assert_eq!(session.query().filter, None);
    }
}
