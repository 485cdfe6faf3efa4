//! Default values for Casebook configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Reporting Defaults
// ============================================================================

/// Number of results accumulated before a batch is submitted.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Attempts made to submit one batch before remote reporting is suspended.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Pause between failed submission attempts (in seconds).
pub const DEFAULT_RETRY_COOLDOWN_SECS: u64 = 5;

// ============================================================================
// Execution Defaults
// ============================================================================

/// Number of cases whose invocations may overlap.
pub const DEFAULT_PARALLELISM: usize = 1;

// ============================================================================
// Azure DevOps
// ============================================================================

/// REST API version sent with every Azure DevOps request.
pub const AZURE_DEVOPS_API_VERSION: &str = "5.0";

// ============================================================================
// Files
// ============================================================================

/// Project-local config file name.
pub const CONFIG_FILE_NAME: &str = "casebook.toml";

/// Directory under the user config dir holding `config.toml`.
pub const USER_CONFIG_DIR: &str = "casebook";
