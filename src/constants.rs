// -
// Settings

/// Environment variable naming an extra settings file
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Prefix of environment overrides, e.g. `WATCH__CLIENT__BASE_URL`
pub(crate) const ENV_PREFIX: &str = "WATCH";

/// Longest accepted stream unit: 4 MiB
pub const DEFAULT_MAX_UNIT_LENGTH: usize = 4 * 1024 * 1024;

// -
// Rollout API

pub(crate) const ROLLOUTS_API_PREFIX: &str = "/api/v1/rollouts";

/// Envelope member carrying the entity on list watch streams
pub(crate) const ROLLOUT_INFO_FIELD: &str = "rolloutInfo";

// -
// Metric labels

pub(crate) const ENTITY_CONTROLLER: &str = "entity";
pub(crate) const LIST_CONTROLLER: &str = "list";
