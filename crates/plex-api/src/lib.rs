//! Minimal Rust client for the Plex Media Server library API
//!
//! Only the pieces needed to walk a season are covered: fetching the children
//! of a metadata item (the episodes of a season) together with their media
//! parts and streams.
//!
//! # Example
//!
//! ```no_run
//! use plex_api::PlexClient;
//!
//! # async fn example() -> Result<(), plex_api::PlexError> {
//! let client = PlexClient::new("http://127.0.0.1:32400", "token")?;
//!
//! let season = client.season_children("12345").await?;
//! for episode in season.media_container.metadata {
//!     println!("{} {:?}", episode.index, episode.primary_part().map(|p| &p.file));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - `GET /library/metadata/{ratingKey}/children?includeElements=Stream`

mod client;
mod error;
mod types;

pub use client::PlexClient;
pub use error::{PlexError, Result};
pub use types::{ChildMetadata, MediaContainer, MediaItem, MediaPart, MetadataChildren, Stream};
