//! Attendee response-status vocabulary mapping.

use meetsync_core::ResponseStatus;

/// Google's only deviation from the canonical vocabulary is
/// `needsAction` for "no answer yet"; unknown values fold into
/// [`ResponseStatus::None`] as well.
pub fn response_from_google(raw: &str) -> ResponseStatus {
    match raw {
        "accepted" => ResponseStatus::Accepted,
        "declined" => ResponseStatus::Declined,
        "tentative" => ResponseStatus::Tentative,
        _ => ResponseStatus::None,
    }
}

pub fn response_to_google(status: ResponseStatus) -> &'static str {
    match status {
        ResponseStatus::None => "needsAction",
        ResponseStatus::Accepted => "accepted",
        ResponseStatus::Declined => "declined",
        ResponseStatus::Tentative => "tentative",
    }
}
