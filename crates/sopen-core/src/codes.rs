//! Stable log category codes.
//!
//! Every advisory failure and operator-visible degradation is logged with one
//! of these codes in a `code` field so observability tooling can match on a
//! stable string instead of free-form message text. Fatal errors carry their
//! code at the single point where the boot routine logs and terminates.

/// Fatal datastore connection failure during boot.
pub const DATASTORE_CONNECT: &str = "DATASTORE_CONNECT";

/// Cache connect failed or cache operations degraded; service continues
/// without caching.
pub const CACHE_UNAVAILABLE: &str = "CACHE_UNAVAILABLE";

/// Cache subsystem administratively disabled by configuration.
pub const CACHE_DISABLED: &str = "CACHE_DISABLED";

/// Queue subsystem administratively disabled; publishing falls back to
/// synchronous direct mode.
pub const QUEUE_DISABLED: &str = "QUEUE_DISABLED";

/// Queue connect or consumer start failed at boot.
pub const QUEUE_UNAVAILABLE: &str = "QUEUE_UNAVAILABLE";

/// Scheduler failed to start; recurring jobs are not running.
pub const SCHEDULER_START: &str = "SCHEDULER_START";

/// A scheduled job returned an error on one tick; the schedule continues.
pub const SCHEDULER_JOB: &str = "SCHEDULER_JOB";

/// File watcher failed to start; filesystem monitoring is not running.
pub const WATCHER_START: &str = "WATCHER_START";

/// Artifact generation failed; the artifact stays absent and requests get a
/// transient-unavailable response.
pub const ARTIFACT_GENERATE: &str = "ARTIFACT_GENERATE";

/// Auth provider initialization failed (malformed credential blob). Fatal for
/// the auth subsystem only; boot continues with auth features disabled.
pub const AUTH_INIT: &str = "AUTH_INIT";

/// Auth credentials absent; auth-gated features are disabled.
pub const AUTH_DISABLED: &str = "AUTH_DISABLED";

/// Advisory configuration sanity check produced a warning.
pub const CONFIG_CHECK: &str = "CONFIG_CHECK";

/// Publish mode selected as synchronous direct publishing.
pub const PUBLISH_DIRECT: &str = "PUBLISH_DIRECT";

/// Fatal boot failure; the process is terminating with a non-zero status.
pub const BOOT_FAIL: &str = "BOOT_FAIL";
