//! Delivery targets for finished report documents

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use walnut_core::settings::{MailSettings, SearchIndexSettings, Settings};

use crate::error::{ReportError, ReportResult};
use crate::model::{Document, ExecutionReport};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one document; sinks ignore kinds they do not handle
    async fn deliver(&self, document: &Document) -> ReportResult<()>;
}

/// Build the sinks enabled in `settings`
pub fn sinks_from_settings(settings: &Settings) -> ReportResult<Vec<Arc<dyn ReportSink>>> {
    let mut sinks: Vec<Arc<dyn ReportSink>> = Vec::new();
    if let Some(search) = settings.search_index() {
        let index = format!(
            "{}{}",
            settings.metadata.product, settings.metadata.product_version
        );
        sinks.push(Arc::new(SearchIndexClient::new(search, &index)?));
    }
    if let Some(mail) = &settings.mail {
        sinks.push(Arc::new(MailRelay::new(mail.clone())?));
    }
    Ok(sinks)
}

fn http_client() -> ReportResult<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

async fn check(sink: &str, document: &Document, resp: reqwest::Response) -> ReportResult<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ReportError::Rejected {
        sink: sink.to_string(),
        kind: document.kind().to_string(),
        message: format!("{} {}", status, body),
    })
}

/// Writes documents to a search index over its REST API
pub struct SearchIndexClient {
    http: reqwest::Client,
    host: String,
    index: String,
    ship_logs: bool,
}

impl SearchIndexClient {
    pub const REPORT_TYPE: &'static str = "reports";
    pub const LOG_TYPE: &'static str = "logs";

    /// `index` is lower-cased
    pub fn new(settings: &SearchIndexSettings, index: &str) -> ReportResult<Self> {
        Ok(Self {
            http: http_client()?,
            host: settings.host.trim_end_matches('/').to_string(),
            index: index.to_lowercase().replace(' ', "_"),
            ship_logs: settings.ship_logs,
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn document_url(&self, doc_type: &str) -> String {
        format!("{}/{}/{}", self.host, self.index, doc_type)
    }
}

#[async_trait]
impl ReportSink for SearchIndexClient {
    fn name(&self) -> &str {
        "search index"
    }

    async fn deliver(&self, document: &Document) -> ReportResult<()> {
        let (doc_type, body) = match document {
            Document::Suite(report) => (Self::REPORT_TYPE, serde_json::to_value(report)?),
            Document::Execution(report) => (Self::REPORT_TYPE, serde_json::to_value(report)?),
            Document::Log(record) if self.ship_logs => (Self::LOG_TYPE, record.clone()),
            Document::Log(_) => return Ok(()),
        };

        let url = self.document_url(doc_type);
        debug!("Indexing {} document at {}", document.kind(), url);
        let resp = self.http.post(&url).json(&body).send().await?;
        check(self.name(), document, resp).await
    }
}

/// Sends the execution summary through an HTTP mail relay
pub struct MailRelay {
    http: reqwest::Client,
    settings: MailSettings,
}

impl MailRelay {
    pub fn new(settings: MailSettings) -> ReportResult<Self> {
        Ok(Self {
            http: http_client()?,
            settings,
        })
    }

    pub fn report_url(&self, run_id: &str) -> Option<String> {
        self.settings
            .report_url
            .as_ref()
            .map(|template| template.replace("{run_id}", run_id))
    }

    /// HTML body of the summary mail
    pub fn render(&self, report: &ExecutionReport) -> String {
        let header = &report.header;
        let summary = report.summary.clone().unwrap_or_default();

        let mut html = String::from("<html><body><div>");
        html.push_str(&format!(
            " Test Results: {} {} {} {}<br><br>",
            header.product, header.version, header.build, header.platform
        ));
        html.push_str("<div><b> Summary : </b></div><br><table border=0 width=30%>");
        let rows = [
            ("Browser:", header.browser.to_uppercase()),
            ("Execution Id:", header.execution_id.clone()),
            ("Execution Type:", header.execution_type.clone()),
            ("Total Tests:", summary.total_tests.to_string()),
            ("Time Elapsed:", summary.elapsed.clone()),
            ("Passed:", summary.passed.to_string()),
            ("Failed:", summary.failed.to_string()),
            ("Retried:", summary.retried.to_string()),
            ("Not Run:", summary.not_run.to_string()),
            ("Pass Percentage:", format!("{}%", summary.pass_percentage())),
        ];
        for (label, value) in rows {
            html.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>", label, value));
        }
        html.push_str("</table><br><div><b> Details : </b></div><br><table border=1 width=50%>");
        html.push_str(
            "<tr><th>SuiteName</th><th>TotalTests</th><th>Passed</th><th>Failed</th><th>Retried</th><th>Not Run</th></tr>",
        );
        for suite in &report.suites {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                suite.name.as_deref().unwrap_or_default(),
                suite.total_tests,
                suite.passed,
                suite.failed,
                suite.retried,
                suite.not_run
            ));
        }
        html.push_str("</table><br>");
        if let Some(url) = self.report_url(&header.execution_id) {
            html.push_str(&format!(
                "The Report can be found at:<br><a href=\"{}\">{}</a>",
                url, url
            ));
        }
        html.push_str("</div></body></html>");
        html
    }
}

#[async_trait]
impl ReportSink for MailRelay {
    fn name(&self) -> &str {
        "mail relay"
    }

    async fn deliver(&self, document: &Document) -> ReportResult<()> {
        let Document::Execution(report) = document else {
            return Ok(());
        };

        let message = json!({
            "from": self.settings.from,
            "to": self.settings.to,
            "subject": self.settings.subject,
            "html": self.render(report),
        });
        let resp = self
            .http
            .post(&self.settings.relay_url)
            .json(&message)
            .send()
            .await?;
        check(self.name(), document, resp).await?;
        info!("E-Mail sent to: {}", self.settings.to.join(", "));
        Ok(())
    }
}
