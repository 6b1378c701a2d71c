//! Carga y gestión de configuración del portal (servidor, backend de casos, tiempos simulados).

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use url::Url;

/// Tiempos de espera que simulan la latencia de los servicios de demostración.
#[derive(Clone, Debug)]
pub struct Delays {
    pub assistant_reply: Duration,
    pub search: Duration,
    pub graph: Duration,
    pub login: Duration,
    pub azure_login: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            assistant_reply: Duration::from_millis(2000),
            search: Duration::from_millis(1000),
            graph: Duration::from_millis(1500),
            login: Duration::from_millis(1000),
            azure_login: Duration::from_millis(1500),
        }
    }
}

impl Delays {
    /// Sin esperas; útil para tests.
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            assistant_reply: Duration::ZERO,
            search: Duration::ZERO,
            graph: Duration::ZERO,
            login: Duration::ZERO,
            azure_login: Duration::ZERO,
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub backend_url: Url,
    pub backend_timeout: Duration,
    pub session_file: PathBuf,
    pub open_browser: bool,
    pub delays: Delays,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());

        let backend_raw =
            env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
        let backend_url = Url::parse(&backend_raw)
            .with_context(|| format!("BACKEND_URL no es una URL válida: {backend_raw}"))?;

        let backend_timeout = Duration::from_millis(env_or("BACKEND_TIMEOUT_MS", 5000u64)?);

        let session_file = match env::var("SESSION_FILE") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_session_file()?,
        };

        let open_browser = env_or("OPEN_BROWSER", true)?;

        let defaults = Delays::default();
        let delays = Delays {
            assistant_reply: env_millis("ASSISTANT_REPLY_DELAY_MS", defaults.assistant_reply)?,
            search: env_millis("SEARCH_DELAY_MS", defaults.search)?,
            graph: env_millis("GRAPH_DELAY_MS", defaults.graph)?,
            login: env_millis("LOGIN_DELAY_MS", defaults.login)?,
            azure_login: env_millis("AZURE_LOGIN_DELAY_MS", defaults.azure_login)?,
        };

        Ok(Self {
            server_addr,
            backend_url,
            backend_timeout,
            session_file,
            open_browser,
            delays,
        })
    }

    /// Configuración apuntando a un backend y fichero de sesión concretos, sin esperas.
    #[cfg(test)]
    pub fn for_tests(backend_url: &str, session_file: PathBuf) -> Self {
        Self {
            server_addr: "127.0.0.1:0".to_string(),
            backend_url: Url::parse(backend_url).expect("URL de test válida"),
            backend_timeout: Duration::from_millis(500),
            session_file,
            open_browser: false,
            delays: Delays::none(),
        }
    }
}

fn default_session_file() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("No se pudo determinar el directorio de datos del usuario"))?;
    Ok(base.join("lexportal").join("session.json"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Valor inválido para {key} ({raw}): {e}")),
        Err(_) => Ok(default),
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration> {
    let millis = env_or(key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delays_match_demo_timings() {
        let delays = Delays::default();
        assert_eq!(delays.assistant_reply, Duration::from_millis(2000));
        assert_eq!(delays.search, Duration::from_millis(1000));
        assert_eq!(delays.graph, Duration::from_millis(1500));
        assert_eq!(delays.login, Duration::from_millis(1000));
        assert_eq!(delays.azure_login, Duration::from_millis(1500));
    }

    #[test]
    fn env_or_falls_back_when_unset() {
        let value: u64 = env_or("LEXPORTAL_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn env_or_rejects_garbage() {
        env::set_var("LEXPORTAL_TEST_BAD_BOOL", "quizás");
        let result: Result<bool> = env_or("LEXPORTAL_TEST_BAD_BOOL", true);
        assert!(result.is_err());
        env::remove_var("LEXPORTAL_TEST_BAD_BOOL");
    }
}
