//! Raw access to the Calendar v3 `events.list` endpoint.

use chrono::SecondsFormat;
use meetsync_core::{Account, DeltaRequest, MeetsyncError, MeetsyncResult};
use reqwest::{Client, StatusCode};

use crate::wire::EventsPage;

pub(crate) const GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

pub(crate) struct GoogleApi {
    client: Client,
    base_url: String,
}

impl GoogleApi {
    pub(crate) fn new(base_url: String) -> Self {
        GoogleApi {
            client: Client::new(),
            base_url,
        }
    }

    /// One page of the primary calendar's change feed. Listing stays in
    /// raw mode (`singleEvents` off), so recurring masters and their
    /// exception instances arrive as separate items.
    pub(crate) async fn list_events(
        &self,
        account: &Account,
        request: &DeltaRequest,
    ) -> MeetsyncResult<EventsPage> {
        let url = format!("{}/calendars/primary/events", self.base_url);

        let mut params: Vec<(&str, String)> = vec![("maxResults", request.page_size.to_string())];
        match &request.cursor {
            Some(token) => params.push(("syncToken", token.clone())),
            None => {
                // timeMin must not accompany a sync token.
                if let Some(start) = request.window_start {
                    params.push(("timeMin", start.to_rfc3339_opts(SecondsFormat::Secs, true)));
                }
            }
        }
        if let Some(token) = &request.page_token {
            params.push(("pageToken", token.clone()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&account.access_token)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                MeetsyncError::ProviderTransient(format!("Google API request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        response.json::<EventsPage>().await.map_err(|e| {
            MeetsyncError::Serialization(format!("Failed to parse Google response: {e}"))
        })
    }
}

fn error_for_status(status: StatusCode, body: &str) -> MeetsyncError {
    match status {
        StatusCode::GONE => MeetsyncError::InvalidSyncToken,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            MeetsyncError::ProviderAuth(format!("Google API error ({status}): {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            MeetsyncError::ProviderTransient(format!("Google API error ({status}): {body}"))
        }
        status if status.is_server_error() => {
            MeetsyncError::ProviderTransient(format!("Google API error ({status}): {body}"))
        }
        status => MeetsyncError::Provider(format!("Google API error ({status}): {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_error_variants() {
        assert!(matches!(
            error_for_status(StatusCode::GONE, ""),
            MeetsyncError::InvalidSyncToken
        ));
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, "token expired"),
            MeetsyncError::ProviderAuth(_)
        ));
        assert!(error_for_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(error_for_status(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(!error_for_status(StatusCode::BAD_REQUEST, "").is_retryable());
    }
}
