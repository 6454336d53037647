use crate::error::Result;
use crate::github::GithubClient;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use tracing::debug;

/// Which provider contract supplies the alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AlertSourceKind {
    /// `GET /repos/{org}/{repo}/dependabot/alerts`, paginated
    #[default]
    Rest,
    /// `repository.vulnerabilityAlerts` through the GraphQL API, first 100
    Graphql,
}

/// One vulnerability finding, normalized across both provider shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub package: Option<String>,
    pub severity: Option<String>,
    pub summary: Option<String>,
    pub status: AlertStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertStatus {
    Open,
    Dismissed(Option<DateTime<Utc>>),
    Fixed,
    Other(String),
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Open => f.write_str("open"),
            AlertStatus::Dismissed(Some(at)) => {
                f.write_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            AlertStatus::Dismissed(None) => f.write_str("dismissed"),
            AlertStatus::Fixed => f.write_str("fixed"),
            AlertStatus::Other(state) => f.write_str(state),
        }
    }
}

#[async_trait]
pub trait AlertFetcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_alerts(&self, client: &GithubClient, org: &str, repo: &str)
        -> Result<Vec<Alert>>;
}

pub fn fetcher_for(kind: AlertSourceKind) -> Box<dyn AlertFetcher> {
    match kind {
        AlertSourceKind::Rest => Box::new(RestAlerts),
        AlertSourceKind::Graphql => Box::new(GraphQlAlerts),
    }
}

// REST: dependabot/alerts

pub struct RestAlerts;

#[derive(Debug, Deserialize)]
struct RestAlert {
    state: Option<String>,
    dependency: Option<RestDependency>,
    security_advisory: Option<RestAdvisory>,
    security_vulnerability: Option<RestVulnerability>,
    dismissed_at: Option<DateTime<Utc>>,
    auto_dismissed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RestDependency {
    package: Option<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestAdvisory {
    summary: Option<String>,
    severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestVulnerability {
    severity: Option<String>,
}

impl From<RestAlert> for Alert {
    fn from(raw: RestAlert) -> Self {
        let status = match (raw.dismissed_at, raw.state.as_deref()) {
            (Some(at), _) => AlertStatus::Dismissed(Some(at)),
            (None, Some("open")) => AlertStatus::Open,
            (None, Some("dismissed" | "auto_dismissed")) => {
                AlertStatus::Dismissed(raw.auto_dismissed_at)
            }
            (None, Some("fixed")) => AlertStatus::Fixed,
            (None, Some(other)) => AlertStatus::Other(other.to_string()),
            (None, None) => AlertStatus::Open,
        };

        let (advisory_severity, summary) = match raw.security_advisory {
            Some(advisory) => (advisory.severity, advisory.summary),
            None => (None, None),
        };

        Alert {
            package: raw.dependency.and_then(|d| d.package).and_then(|p| p.name),
            severity: advisory_severity
                .or_else(|| raw.security_vulnerability.and_then(|v| v.severity))
                .map(|s| s.to_lowercase()),
            summary,
            status,
        }
    }
}

#[async_trait]
impl AlertFetcher for RestAlerts {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch_alerts(
        &self,
        client: &GithubClient,
        org: &str,
        repo: &str,
    ) -> Result<Vec<Alert>> {
        let url = client.rest_url(&format!("/repos/{org}/{repo}/dependabot/alerts?per_page=100"));
        let raw: Vec<RestAlert> = client.paginate(url).await;
        debug!(count = raw.len(), "fetched alerts over REST");
        Ok(raw.into_iter().map(Alert::from).collect())
    }
}

// GraphQL: repository.vulnerabilityAlerts

pub struct GraphQlAlerts;

const VULNERABILITY_ALERTS_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    vulnerabilityAlerts(first: 100) {
      edges {
        node {
          createdAt
          dismissedAt
          securityVulnerability {
            package { name }
            advisory { summary severity }
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
}

#[derive(Debug, Deserialize)]
struct GqlData {
    repository: Option<GqlRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlRepository {
    vulnerability_alerts: Option<GqlConnection>,
}

#[derive(Debug, Deserialize)]
struct GqlConnection {
    edges: Option<Vec<Option<GqlEdge>>>,
}

#[derive(Debug, Deserialize)]
struct GqlEdge {
    node: Option<GqlNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlNode {
    created_at: Option<DateTime<Utc>>,
    dismissed_at: Option<DateTime<Utc>>,
    security_vulnerability: Option<GqlVulnerability>,
}

#[derive(Debug, Deserialize)]
struct GqlVulnerability {
    package: Option<Package>,
    advisory: Option<GqlAdvisory>,
}

#[derive(Debug, Deserialize)]
struct GqlAdvisory {
    summary: Option<String>,
    severity: Option<String>,
}

impl From<GqlNode> for Alert {
    fn from(node: GqlNode) -> Self {
        let (package, advisory) = match node.security_vulnerability {
            Some(v) => (v.package.and_then(|p| p.name), v.advisory),
            None => (None, None),
        };
        let (summary, severity) = match advisory {
            Some(a) => (a.summary, a.severity),
            None => (None, None),
        };

        Alert {
            package,
            severity: severity.map(|s| s.to_lowercase()),
            summary,
            status: match node.dismissed_at {
                Some(at) => AlertStatus::Dismissed(Some(at)),
                None => AlertStatus::Open,
            },
        }
    }
}

#[async_trait]
impl AlertFetcher for GraphQlAlerts {
    fn name(&self) -> &'static str {
        "graphql"
    }

    async fn fetch_alerts(
        &self,
        client: &GithubClient,
        org: &str,
        repo: &str,
    ) -> Result<Vec<Alert>> {
        let value = client
            .graphql(
                VULNERABILITY_ALERTS_QUERY,
                json!({ "owner": org, "name": repo }),
            )
            .await?;
        let response: GqlResponse = serde_json::from_value(value)?;

        let alerts: Vec<Alert> = response
            .data
            .and_then(|d| d.repository)
            .and_then(|r| r.vulnerability_alerts)
            .and_then(|c| c.edges)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(|edge| edge.node)
            .inspect(|node| {
                debug!(
                    created_at = ?node.created_at,
                    dismissed_at = ?node.dismissed_at,
                    "vulnerability alert node"
                )
            })
            .map(Alert::from)
            .collect();
        debug!(count = alerts.len(), "fetched alerts over GraphQL");
        Ok(alerts)
    }
}
