//! Raw access to the Graph `calendarView/delta` and attachment
//! endpoints.

use chrono::SecondsFormat;
use meetsync_core::{Account, DeltaRequest, MeetsyncError, MeetsyncResult};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::wire::{AttachmentsResponse, DeltaFeed, GraphEvent};

pub(crate) const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// calendarView requires an explicit end; full listings run to this
/// provider-max bound.
const CALENDAR_MAX_END: &str = "2050-12-31T23:59:59Z";

const OUTLOOK_TIMEZONE_HEADER: &str = r#"outlook.timezone="UTC""#;

/// One fetched page with its continuation tokens already extracted
/// from the odata links.
pub(crate) struct FeedPage {
    pub items: Vec<GraphEvent>,
    pub next_page_token: Option<String>,
    pub next_cursor: Option<String>,
}

pub(crate) struct GraphApi {
    client: Client,
    base_url: String,
}

impl GraphApi {
    pub(crate) fn new(base_url: String) -> Self {
        GraphApi {
            client: Client::new(),
            base_url,
        }
    }

    /// One page of the delta feed. Mid-pass continuation rides on
    /// `$skiptoken`, a completed pass hands back `$deltatoken`; both
    /// arrive embedded in odata links and leave here as bare tokens.
    pub(crate) async fn delta_page(
        &self,
        account: &Account,
        request: &DeltaRequest,
    ) -> MeetsyncResult<FeedPage> {
        let url = format!("{}/me/calendarView/delta", self.base_url);

        let mut params: Vec<(&str, String)> = Vec::new();
        if request.cursor.is_none() {
            if let Some(start) = request.window_start {
                params.push((
                    "startDateTime",
                    start.to_rfc3339_opts(SecondsFormat::Secs, true),
                ));
                let end = request
                    .window_end
                    .map(|end| end.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .unwrap_or_else(|| CALENDAR_MAX_END.to_string());
                params.push(("endDateTime", end));
            }
        }
        match &request.page_token {
            Some(token) => params.push(("$skiptoken", token.clone())),
            None => {
                if let Some(token) = &request.cursor {
                    params.push(("$deltatoken", token.clone()));
                }
            }
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&account.access_token)
            .header("Prefer", OUTLOOK_TIMEZONE_HEADER)
            .header("Prefer", format!("odata.maxpagesize={}", request.page_size))
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                MeetsyncError::ProviderTransient(format!("Graph API request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        let feed = response.json::<DeltaFeed>().await.map_err(|e| {
            MeetsyncError::Serialization(format!("Failed to parse Graph response: {e}"))
        })?;

        let next_page_token = feed
            .next_link
            .as_deref()
            .map(|link| link_token(link, "$skiptoken"))
            .transpose()?;
        let next_cursor = if next_page_token.is_some() {
            None
        } else {
            feed.delta_link
                .as_deref()
                .map(|link| link_token(link, "$deltatoken"))
                .transpose()?
        };

        Ok(FeedPage {
            items: feed.value,
            next_page_token,
            next_cursor,
        })
    }

    pub(crate) async fn list_attachments(
        &self,
        account: &Account,
        event_id: &str,
    ) -> MeetsyncResult<AttachmentsResponse> {
        let url = format!("{}/me/events/{}/attachments", self.base_url, event_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&account.access_token)
            .send()
            .await
            .map_err(|e| {
                MeetsyncError::ProviderTransient(format!("Graph API request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        response.json::<AttachmentsResponse>().await.map_err(|e| {
            MeetsyncError::Serialization(format!("Failed to parse Graph response: {e}"))
        })
    }
}

/// Pulls one query parameter out of a continuation link.
fn link_token(link: &str, key: &str) -> MeetsyncResult<String> {
    let url = Url::parse(link)
        .map_err(|e| MeetsyncError::Provider(format!("Malformed continuation link: {e}")))?;
    url.query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| MeetsyncError::Provider(format!("Continuation link missing {key}")))
}

fn error_for_status(status: StatusCode, body: &str) -> MeetsyncError {
    match status {
        StatusCode::GONE => MeetsyncError::InvalidSyncToken,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            MeetsyncError::ProviderAuth(format!("Graph API error ({status}): {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            MeetsyncError::ProviderTransient(format!("Graph API error ({status}): {body}"))
        }
        status if status.is_server_error() => {
            MeetsyncError::ProviderTransient(format!("Graph API error ({status}): {body}"))
        }
        status => MeetsyncError::Provider(format!("Graph API error ({status}): {body}")),
    }
}
