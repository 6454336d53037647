use crate::github::GithubClient;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A user reference as returned by listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct UserStub {
    pub login: String,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub admin: Option<bool>,
}

/// A resolved profile. `email` is `None` unless the user made it public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetail {
    pub login: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Outcome of resolving one [`UserStub`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contact {
    Resolved(UserDetail),
    Skipped { login: String, reason: String },
}

impl Contact {
    pub fn detail(&self) -> Option<&UserDetail> {
        match self {
            Contact::Resolved(detail) => Some(detail),
            Contact::Skipped { .. } => None,
        }
    }
}

/// Looks up each stub's profile in order. A failed lookup yields
/// [`Contact::Skipped`] and the remaining stubs are still resolved.
pub async fn resolve_users(client: &GithubClient, users: &[UserStub]) -> Vec<Contact> {
    let mut contacts = Vec::with_capacity(users.len());
    for user in users {
        contacts.push(resolve_user(client, &user.login).await);
    }
    contacts
}

async fn resolve_user(client: &GithubClient, login: &str) -> Contact {
    let skipped = |reason: String| {
        warn!(login, %reason, "Failed to fetch user details");
        Contact::Skipped {
            login: login.to_string(),
            reason,
        }
    };

    let response = match client.get(&client.rest_url(&format!("/users/{login}"))).await {
        Ok(response) => response,
        Err(e) => return skipped(e.to_string()),
    };
    if response.status != StatusCode::OK {
        return skipped(format!("HTTP {}", response.status.as_u16()));
    }
    match serde_json::from_str::<UserDetail>(&response.body) {
        Ok(detail) => Contact::Resolved(detail),
        Err(e) => skipped(format!("unexpected profile body: {e}")),
    }
}

/// Organization members holding the admin role.
pub async fn org_owners(client: &GithubClient, org: &str) -> Vec<Contact> {
    let url = client.rest_url(&format!("/orgs/{org}/members?role=admin&per_page=100"));
    let owners: Vec<UserStub> = client.paginate(url).await;
    resolve_users(client, &owners).await
}

/// Direct collaborators of `org/repo` with admin permission.
pub async fn repo_admins(client: &GithubClient, org: &str, repo: &str) -> Vec<Contact> {
    let url = client.rest_url(&format!(
        "/repos/{org}/{repo}/collaborators?affiliation=direct&per_page=100"
    ));
    let collaborators: Vec<UserStub> = client.paginate(url).await;
    let admins: Vec<UserStub> = collaborators
        .into_iter()
        .filter(|user| {
            user.permissions
                .as_ref()
                .and_then(|p| p.admin)
                .unwrap_or(true)
        })
        .collect();
    resolve_users(client, &admins).await
}
