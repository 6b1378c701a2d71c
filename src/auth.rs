//! Sesión de demostración del portal.
//!
//! No hay verificación real de credenciales: el inicio de sesión espera un
//! tiempo fijo, fabrica un usuario y guarda un token opaco en el
//! almacenamiento local, que solo sirve como indicador de "sesión iniciada".

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{config::Delays, models::User};

/// Clave bajo la que se guarda el token de sesión.
pub const TOKEN_KEY: &str = "authToken";

const LOGIN_FAILED: &str = "بيانات الدخول غير صحيحة. يرجى المحاولة مرة أخرى.";
const AZURE_LOGIN_FAILED: &str = "فشل تسجيل الدخول بـ Azure AD. يرجى المحاولة مرة أخرى.";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{}", LOGIN_FAILED)]
    LoginFailed,

    #[error("{}", AZURE_LOGIN_FAILED)]
    AzureLoginFailed,

    #[error("No hay ninguna sesión iniciada")]
    NotAuthenticated,

    #[error("Error en el almacenamiento de sesión: {0}")]
    Storage(#[from] io::Error),
}

/// Almacenamiento local clave/valor persistido como JSON en disco.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    path: PathBuf,
}

impl SessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Un fichero ilegible se trata como vacío: la siguiente escritura lo reemplaza.
    fn read_all(&self) -> io::Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(
                    "Almacenamiento de sesión corrupto en {}, se descarta: {e}",
                    self.path.display()
                );
                BTreeMap::new()
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, raw)
    }

    pub fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    /// Quita la clave y reescribe el fichero, lo que también sanea uno corrupto.
    pub fn remove(&self, key: &str) -> io::Result<()> {
        let mut entries = self.read_all()?;
        entries.remove(key);
        if self.path.exists() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Preferencias de la página de perfil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub dark_mode: bool,
    pub notifications: bool,
    pub auto_save: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            notifications: true,
            auto_save: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub organization: Option<String>,
}

pub struct AuthStore {
    user: Mutex<Option<User>>,
    settings: Mutex<UserSettings>,
    storage: SessionStorage,
    delays: Delays,
}

impl AuthStore {
    pub fn new(storage: SessionStorage, delays: Delays) -> Self {
        Self {
            user: Mutex::new(None),
            settings: Mutex::new(UserSettings::default()),
            storage,
            delays,
        }
    }

    /// Recupera la sesión si hay un token guardado.
    pub fn restore(&self) -> Result<bool, AuthError> {
        if self.storage.get(TOKEN_KEY)?.is_some() {
            *self.user.lock().unwrap() = Some(User {
                id: "1".into(),
                name: "Sarah Chen".into(),
                email: "sarah.chen@lawfirm.com".into(),
                organization: Some("Chen & Associates".into()),
                avatar: Some("/avatars/sarah.jpg".into()),
            });
            info!("Sesión restaurada desde {}", self.storage.path().display());
            return Ok(true);
        }
        Ok(false)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.lock().unwrap().is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.lock().unwrap().clone()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        tokio::time::sleep(self.delays.login).await;

        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::LoginFailed);
        }

        let user = User {
            id: "1".into(),
            name: "Sarah Chen".into(),
            email: email.trim().to_string(),
            organization: Some("Chen & Associates".into()),
            avatar: None,
        };
        self.storage.set(TOKEN_KEY, "mock-jwt-token").map_err(|e| {
            error!("No se pudo guardar el token de sesión: {e}");
            AuthError::LoginFailed
        })?;
        *self.user.lock().unwrap() = Some(user.clone());
        info!("Sesión iniciada para {}", user.email);
        Ok(user)
    }

    pub async fn login_with_azure(&self) -> Result<User, AuthError> {
        tokio::time::sleep(self.delays.azure_login).await;

        let user = User {
            id: "1".into(),
            name: "Sarah Chen".into(),
            email: "sarah.chen@company.onmicrosoft.com".into(),
            organization: Some("Legal Corp".into()),
            avatar: None,
        };
        self.storage.set(TOKEN_KEY, "mock-azure-token").map_err(|e| {
            error!("No se pudo guardar el token de Azure AD: {e}");
            AuthError::AzureLoginFailed
        })?;
        *self.user.lock().unwrap() = Some(user.clone());
        info!("Sesión iniciada con Azure AD para {}", user.email);
        Ok(user)
    }

    /// Borra el usuario en memoria y el token guardado, haya sesión o no.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.user.lock().unwrap().take();
        self.storage.remove(TOKEN_KEY)?;
        info!("Sesión cerrada");
        Ok(())
    }

    pub fn update_profile(&self, update: ProfileUpdate) -> Result<User, AuthError> {
        let mut guard = self.user.lock().unwrap();
        let user = guard.as_mut().ok_or(AuthError::NotAuthenticated)?;
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(organization) = update.organization {
            user.organization = Some(organization);
        }
        Ok(user.clone())
    }

    pub fn settings(&self) -> UserSettings {
        self.settings.lock().unwrap().clone()
    }

    pub fn update_settings(&self, settings: UserSettings) -> UserSettings {
        *self.settings.lock().unwrap() = settings.clone();
        settings
    }
}
