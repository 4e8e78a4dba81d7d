//! Shared HTTP constants (headers, problem URIs, event filters).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_LAST_EVENT_ID: &str = "last-event-id";
pub(crate) const SSE_KEEP_ALIVE_SECS: u64 = 20;

pub(crate) const PROBLEM_INTERNAL: &str = "https://alttext.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://alttext.dev/problems/bad-request";
pub(crate) const PROBLEM_FORBIDDEN: &str = "https://alttext.dev/problems/forbidden";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://alttext.dev/problems/not-found";
pub(crate) const PROBLEM_CONFLICT: &str = "https://alttext.dev/problems/conflict";
pub(crate) const PROBLEM_LICENSE_INVALID: &str = "https://alttext.dev/problems/license-invalid";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://alttext.dev/problems/service-unavailable";

pub(crate) const EVENT_KIND_WHITELIST: &[&str] = &[
    "run_started",
    "item_status_changed",
    "run_completed",
    "progress_reset",
    "run_rejected",
    "upgrade_required",
    "usage_refreshed",
    "asset_registered",
    "auto_tagged",
    "auto_tag_failed",
    "settings_changed",
];
