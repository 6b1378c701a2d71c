//! Resolución de rutas del portal: qué página corresponde a cada ruta y si
//! hace falta una sesión para verla.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "page", rename_all = "camelCase")]
pub enum Page {
    Login,
    Dashboard,
    Documents,
    Cases,
    CaseWorkspace {
        #[serde(rename = "caseId")]
        case_id: String,
    },
    Profile,
}

impl Page {
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::Login)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Navigation {
    Render(Page),
    Redirect { to: String },
    NotFound,
}

fn redirect(to: &str) -> Navigation {
    Navigation::Redirect { to: to.to_string() }
}

fn parse(path: &str) -> Option<Page> {
    let segments: Vec<&str> = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        ["login"] => Some(Page::Login),
        ["dashboard"] => Some(Page::Dashboard),
        ["documents"] => Some(Page::Documents),
        ["cases"] => Some(Page::Cases),
        ["cases", id] => Some(Page::CaseWorkspace {
            case_id: id.to_string(),
        }),
        ["profile"] => Some(Page::Profile),
        _ => None,
    }
}

/// Decide qué hacer con `path` según el estado de la sesión.
pub fn resolve(path: &str, authenticated: bool) -> Navigation {
    let is_index = path
        .split(['?', '#'])
        .next()
        .map_or(true, |p| p.trim_matches('/').is_empty());
    if is_index {
        return if authenticated {
            redirect("/dashboard")
        } else {
            redirect("/login")
        };
    }

    match parse(path) {
        Some(page) if page.is_protected() && !authenticated => redirect("/login"),
        Some(page) => Navigation::Render(page),
        None if !authenticated => redirect("/login"),
        None => Navigation::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_redirects_by_session() {
        assert_eq!(resolve("/", true), redirect("/dashboard"));
        assert_eq!(resolve("/", false), redirect("/login"));
        assert_eq!(resolve("", false), redirect("/login"));
    }

    #[test]
    fn login_is_always_reachable() {
        assert_eq!(resolve("/login", false), Navigation::Render(Page::Login));
        assert_eq!(resolve("/login", true), Navigation::Render(Page::Login));
    }

    #[test]
    fn protected_pages_need_a_session() {
        for path in ["/dashboard", "/documents", "/cases", "/cases/7", "/profile"] {
            assert_eq!(resolve(path, false), redirect("/login"), "{path}");
        }
    }

    #[test]
    fn workspace_captures_case_id() {
        assert_eq!(
            resolve("/cases/abc-123?tab=graph", true),
            Navigation::Render(Page::CaseWorkspace {
                case_id: "abc-123".into()
            })
        );
    }

    #[test]
    fn unknown_paths() {
        assert_eq!(resolve("/cases/1/extra", true), Navigation::NotFound);
        assert_eq!(resolve("/settings", false), redirect("/login"));
    }

    #[test]
    fn serializes_for_frontend() {
        let value = serde_json::to_value(resolve("/cases/9", true)).unwrap();
        assert_eq!(value["action"], "render");
        assert_eq!(value["page"], "caseWorkspace");
        assert_eq!(value["caseId"], "9");
    }
}
