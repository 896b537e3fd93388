//! Attendee response-status vocabulary mapping.

use meetsync_core::ResponseStatus;

/// Graph's vocabulary is wider than the canonical one: `notResponded`
/// and `none` both mean no answer, `organizer` implies acceptance, and
/// `tentativelyAccepted` is canonical tentative. Matching is
/// case-insensitive because Graph has shipped both spellings of
/// several values over time.
pub fn response_from_graph(raw: &str) -> ResponseStatus {
    match raw.to_ascii_lowercase().as_str() {
        "accepted" | "organizer" => ResponseStatus::Accepted,
        "declined" => ResponseStatus::Declined,
        "tentative" | "tentativelyaccepted" => ResponseStatus::Tentative,
        _ => ResponseStatus::None,
    }
}

pub fn response_to_graph(status: ResponseStatus) -> &'static str {
    match status {
        ResponseStatus::None => "notResponded",
        ResponseStatus::Accepted => "accepted",
        ResponseStatus::Declined => "declined",
        ResponseStatus::Tentative => "tentativelyAccepted",
    }
}
