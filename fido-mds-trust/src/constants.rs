//! Defaults for fetching the FIDO Alliance metadata BLOB.

use chrono::NaiveTime;
use std::time::Duration;

/// Where the FIDO Alliance publishes the production metadata BLOB.
pub const FIDO_MDS_URL: &str = "https://mds.fidoalliance.org/";

/// How long a single BLOB fetch may take, including reading the body.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The UTC time of day scheduled refreshes run at.
pub const DEFAULT_REFRESH_AT: NaiveTime = NaiveTime::MIN;

pub use fido_pki::GLOBAL_SIGN_ROOT_CA_R3;
