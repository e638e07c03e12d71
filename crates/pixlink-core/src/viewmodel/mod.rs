//! View-models driven by UI events and change-feed notifications.
//!
//! Each view-model owns its backend handle and subscriptions; dropping it
//! unsubscribes.

mod auth;
mod chat;
mod gallery;
mod generate;
mod image_card;
mod profile;
mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::AuthBridge;
pub use chat::ChatViewModel;
pub use gallery::GalleryViewModel;
pub use generate::{GenerateViewModel, GENERATE_FUNCTION};
pub use image_card::ImageCard;
pub use profile::{ProfileViewModel, AVATAR_PREFIX};
pub use upload::UploadViewModel;
