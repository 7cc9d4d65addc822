use uuid::Uuid;

use onhub_types::api::LoginResponse;

use crate::error::{Result, StoreError};
use crate::{Backend, Store};

pub const CURRENT_USER_KEY: &str = "onhub_current_user";
pub const LOGGED_IN_KEY: &str = "onhub_is_logged_in";

/// The only credentials the local backend accepts.
const LOCAL_ADMIN_USER: &str = "admin";
const LOCAL_ADMIN_PASSWORD: &str = "123456";

impl Store {
    /// Local backend: hardcoded admin check, token minted client-side.
    /// Remote backend: POST `{username, password}` to `/auth/login`.
    /// Either way the session lands in the local kv keys.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let session = match self.backend()? {
            Backend::Remote(remote) => remote.login(username, password).await?,
            Backend::Local(_) => {
                if username != LOCAL_ADMIN_USER || password != LOCAL_ADMIN_PASSWORD {
                    return Err(StoreError::Unauthorized);
                }
                LoginResponse {
                    user: username.to_string(),
                    token: Uuid::new_v4().to_string(),
                }
            }
        };

        self.local().kv_set(CURRENT_USER_KEY, &session.user)?;
        self.local().kv_set(LOGGED_IN_KEY, "true")?;
        Ok(session)
    }

    pub fn logout(&self) -> Result<()> {
        self.local().kv_delete(CURRENT_USER_KEY)?;
        self.local().kv_delete(LOGGED_IN_KEY)
    }

    pub fn current_user(&self) -> Result<Option<String>> {
        self.local().kv_get(CURRENT_USER_KEY)
    }

    pub fn is_logged_in(&self) -> Result<bool> {
        Ok(self.local().kv_get(LOGGED_IN_KEY)?.as_deref() == Some("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_login_accepts_only_the_hardcoded_pair() {
        let store = Store::open_in_memory().unwrap();

        let err = store.login("admin", "wrong").await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));
        assert!(!store.is_logged_in().unwrap());

        let session = store.login("admin", "123456").await.unwrap();
        assert_eq!(session.user, "admin");
        assert!(!session.token.is_empty());
        assert!(store.is_logged_in().unwrap());
        assert_eq!(store.current_user().unwrap().as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn logout_clears_the_session() {
        let store = Store::open_in_memory().unwrap();
        store.login("admin", "123456").await.unwrap();

        store.logout().unwrap();
        assert!(!store.is_logged_in().unwrap());
        assert!(store.current_user().unwrap().is_none());
    }
}
