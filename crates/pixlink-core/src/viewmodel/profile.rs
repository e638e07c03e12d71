//! Profile page: lazy creation, editing and avatars.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::media::FileUpload;
use crate::models::{default_username, NewProfile, Profile, ProfileUpdate};
use crate::util::unix_millis_now;

/// Object prefix for avatars inside the image bucket
pub const AVATAR_PREFIX: &str = "avatars";

pub struct ProfileViewModel {
    backend: Backend,
    profile: Option<Profile>,
}

impl ProfileViewModel {
    pub const fn new(backend: Backend) -> Self {
        Self {
            backend,
            profile: None,
        }
    }

    pub const fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Fetch the signed-in user's profile, creating it on first view.
    pub async fn load_or_create(&mut self) -> Result<&Profile> {
        let user = self.backend.session.require_user()?;
        let store = &self.backend.store;

        let profile = if let Some(profile) = store.get_profile(user.id).await? {
            profile
        } else {
            let full_name = user
                .user_metadata
                .full_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .or_else(|| user.email.clone());
            let mut new_profile = NewProfile {
                id: user.id,
                username: default_username(user.email.as_deref(), &user.id),
                full_name,
            };
            match store.insert_profile(&new_profile).await {
                Ok(profile) => profile,
                Err(Error::UniqueViolation(_)) => {
                    new_profile.username = default_username(None, &user.id);
                    store.insert_profile(&new_profile).await?
                }
                Err(error) => return Err(error),
            }
        };

        Ok(self.profile.insert(profile))
    }

    /// Validate and persist the edit form.
    pub async fn save(&mut self, username: &str, full_name: &str) -> Result<&Profile> {
        let update = ProfileUpdate::from_form(username, full_name)?;
        let user = self.backend.session.require_user()?;

        let profile = match self.backend.store.update_profile(user.id, &update).await {
            Ok(profile) => profile,
            Err(Error::UniqueViolation(_)) => return Err(Error::UsernameTaken),
            Err(error) => return Err(error),
        };
        tracing::info!("Saved profile {}", profile.username);
        Ok(self.profile.insert(profile))
    }

    /// Replace the avatar with `file` and return its public URL.
    pub async fn upload_avatar(&mut self, file: &FileUpload) -> Result<String> {
        file.validate_avatar()?;
        let user = self.backend.session.require_user()?;
        let bucket = &self.backend.bucket;

        let previous = self
            .profile
            .as_ref()
            .and_then(|profile| profile.avatar_url.as_deref())
            .and_then(|url| url.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .map(|segment| format!("{AVATAR_PREFIX}/{segment}"));
        if let Some(old) = previous {
            if let Err(error) = self.backend.storage.remove(bucket, &[old.clone()]).await {
                tracing::warn!("Failed to remove old avatar {old}: {error}");
            }
        }

        let path = format!(
            "{AVATAR_PREFIX}/{}-{}.{}",
            user.id,
            unix_millis_now(),
            file.extension()
        );
        self.backend
            .storage
            .upload(bucket, &path, file.bytes.clone(), &file.content_type)
            .await?;
        let url = self.backend.storage.public_url(bucket, &path);
        self.backend.store.set_avatar_url(user.id, &url).await?;

        if let Some(profile) = self.profile.as_mut() {
            profile.avatar_url = Some(url.clone());
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;
    use crate::error::ValidationError;
    use crate::viewmodel::test_support::{local_backend, sign_up_request, signed_in, PNG_BYTES};
    use crate::viewmodel::AuthBridge;
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread")]
    async fn first_view_creates_profile_from_email() {
        let (backend, _dir) = local_backend().await;
        let mut request = sign_up_request("ignored");
        request.email = "jane.doe@example.com".to_string();
        request.full_name = "Jane Doe".to_string();
        AuthBridge::new(&backend, MemorySessionStore::default())
            .sign_up(&request)
            .await
            .unwrap();

        let mut view = ProfileViewModel::new(backend.clone());
        let created = view.load_or_create().await.unwrap().clone();
        assert_eq!(created.username, "jane_doe");
        assert_eq!(created.full_name.as_deref(), Some("Jane Doe"));

        let mut again = ProfileViewModel::new(backend);
        assert_eq!(again.load_or_create().await.unwrap(), &created);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_validates_then_normalizes() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        signed_in(&backend, "taken_name").await;

        let mut view = ProfileViewModel::new(ada);
        view.load_or_create().await.unwrap();
        assert!(matches!(
            view.save("a b", "").await,
            Err(Error::Validation(ValidationError::UsernameCharset))
        ));
        assert!(matches!(
            view.save("Taken_Name", "").await,
            Err(Error::UsernameTaken)
        ));

        let saved = view.save("Ada_L", "  Ada Lovelace ").await.unwrap();
        assert_eq!(saved.username, "ada_l");
        assert_eq!(saved.full_name.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn avatar_replacement_removes_previous_object() {
        let (backend, dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let mut view = ProfileViewModel::new(ada.clone());
        view.load_or_create().await.unwrap();

        let too_big = FileUpload::new("a.png", vec![0x89; crate::media::AVATAR_MAX_BYTES + 1]);
        assert!(view.upload_avatar(&too_big).await.is_err());

        let first = view
            .upload_avatar(&FileUpload::new("a.png", PNG_BYTES.to_vec()))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = view
            .upload_avatar(&FileUpload::new("b.png", PNG_BYTES.to_vec()))
            .await
            .unwrap();
        assert_ne!(first, second);

        let avatars = dir.path().join("objects").join("images").join(AVATAR_PREFIX);
        assert_eq!(std::fs::read_dir(avatars).unwrap().count(), 1);
        let id = ada.session.user_id().unwrap();
        let stored = ada.store.get_profile(id).await.unwrap().unwrap();
        assert_eq!(stored.avatar_url.as_deref(), Some(second.as_str()));
    }
}
