//! Marketing attribution capture.
//!
//! For every tracked request the crate derives an [`AttributionRecord`]
//! (landing page, referrer, UTM parameters, click identifiers and any
//! configured custom parameters) and records it as a [`Visit`], either in-line
//! or through the background [`JobQueue`].
//!
//! ```rust,ignore
//! let db = Arc::new(Database::new(data_dir.join("footprints.sqlite3"))?);
//! let config = ConfigStore::new(data_dir.join("footprints.json"))?.current();
//! let capture = AttributionCapture::with_queue(config, db)?;
//!
//! let request = RequestSnapshot::builder(&url)?
//!     .remote_addr(peer_ip)
//!     .header("Referer", referer)
//!     .build(&Footprinter::default());
//! let request = capture.track(request, current_user_id).await?;
//! ```

mod capture;
mod config;
mod db;
mod footprint;
mod jobs;
mod models;
mod request;
mod utils;

pub use capture::{
    capture_attribution, normalize_value, referrer_host, truncate, AttributionCapture,
    MAX_ATTRIBUTE_CHARS,
};
pub use config::{ConfigStore, FootprintsConfig, ASYNC_ENV_VAR};
pub use db::{Database, Visit};
pub use footprint::{parse_cookie_header, Footprinter, DEFAULT_COOKIE_NAME};
pub use jobs::{Dispatcher, JobQueue, TrackVisit, VisitRecorder};
pub use models::{Attribute, AttributionRecord, UserId};
pub use request::{RequestBuilder, RequestSnapshot, TrackedRequest};
pub use utils::logging::init_logging;
