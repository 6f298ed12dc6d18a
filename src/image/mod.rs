//! Image handles and the ways to obtain them.
//!
//! Images come either from an ordered list of default candidates probed at startup
//! or from a manual upload; both end up as an immutable [`ImageHandle`].

pub mod handle;
pub mod loader;
pub mod source;

pub use handle::{detect_media_type, ImageHandle};
pub use loader::{load_first, ImageFetcher, ImageLoader};
pub use source::ImageSource;
