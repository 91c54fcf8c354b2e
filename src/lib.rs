//! CrowdSec bouncer for Cloudflare IP lists.
//!
//! Streams ban decisions from a CrowdSec Local API and mirrors them into a
//! Cloudflare account IP list, batching list updates on a timer to stay within
//! API rate limits.
//!
//! # Features
//!
//! - **Batched Updates** - Decisions are coalesced and flushed on a fixed interval
//! - **Deduplication** - Repeated decisions within a window produce one request
//! - **ID Tracking** - Remote item IDs are remembered so unbans delete the right item
//! - **Retry with Backoff** - Transient API failures re-queue the batch
//! - **Firewall Rule** - Optionally installs an `ip.src in $list` rule in a zone
//! - **Graceful Shutdown** - SIGINT/SIGTERM stop all loops after any flush in progress
//!
//! # Example Configuration
//!
//! ```yaml
//! crowdsec:
//!   lapi_url: "http://127.0.0.1:8080"
//!   lapi_key: "${CROWDSEC_LAPI_KEY}"
//!
//! cloudflare:
//!   api_token: "${CLOUDFLARE_API_TOKEN}"
//!   account_id: "your-account-id"
//!   zone_id: "your-zone-id"
//!   update_frequency_seconds: 30
//! ```

pub mod bouncer;
pub mod collector;
pub mod config;
pub mod decision;
pub mod error;
pub mod gateway;
pub mod retry;
pub mod scheduler;
pub mod signal;
pub mod state;
pub mod stream;

pub use bouncer::Bouncer;
pub use config::Config;
