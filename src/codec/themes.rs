use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("Theme not found: {0}")]
    NotFound(String),
    #[error("Failed to read theme {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stylesheet applied to rendered markdown notes.
#[derive(Debug, Clone, Serialize)]
pub struct Theme {
    pub name: String,
    pub css: String,
}

impl Theme {
    /// Resolve a theme by name.
    ///
    /// `<themes_dir>/<name>.css` takes precedence over the built-in themes so a
    /// user can shadow `github` with their own copy.
    pub fn load(name: &str, themes_dir: Option<&Path>) -> Result<Self, ThemeError> {
        if let Some(dir) = themes_dir {
            let path = dir.join(format!("{}.css", name));
            if path.exists() {
                log::debug!("Loading theme css from {}", path.display());
                let css = std::fs::read_to_string(&path)
                    .map_err(|source| ThemeError::Unreadable { path, source })?;
                return Ok(Self {
                    name: name.to_string(),
                    css,
                });
            }
        }

        get_builtin_theme(name).ok_or_else(|| ThemeError::NotFound(name.to_string()))
    }
}

pub fn get_builtin_theme(name: &str) -> Option<Theme> {
    let css = match name {
        "github" => GITHUB_CSS,
        "minimal" => MINIMAL_CSS,
        "academic" => ACADEMIC_CSS,
        _ => return None,
    };
    Some(Theme {
        name: name.to_string(),
        css: css.to_string(),
    })
}

pub fn available_themes() -> Vec<&'static str> {
    vec!["github", "minimal", "academic"]
}

// ---------------------------------------------------------------------------
// GitHub-like theme
// ---------------------------------------------------------------------------
const GITHUB_CSS: &str = r#"/* Adapted from the usual markdown-body look */
.markdown-body {
  font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif;
  font-size: 16px;
  line-height: 1.5;
  color: #24292e;
  word-wrap: break-word;
}
.markdown-body h1 { font-size: 2em; padding-bottom: 0.3em; border-bottom: 1px solid #eaecef; margin-top: 24px; margin-bottom: 16px; font-weight: 600; }
.markdown-body h2 { font-size: 1.5em; padding-bottom: 0.3em; border-bottom: 1px solid #eaecef; margin-top: 24px; margin-bottom: 16px; font-weight: 600; }
.markdown-body h3 { font-size: 1.25em; margin-top: 24px; margin-bottom: 16px; font-weight: 600; }
.markdown-body h4, .markdown-body h5, .markdown-body h6 { font-size: 1em; margin-top: 24px; margin-bottom: 16px; font-weight: 600; }
.markdown-body p { margin-top: 0; margin-bottom: 16px; }
.markdown-body a { color: #0366d6; text-decoration: none; }
.markdown-body blockquote { margin: 0 0 16px 0; padding: 0 1em; color: #6a737d; border-left: 0.25em solid #dfe2e5; }
.markdown-body ul, .markdown-body ol { padding-left: 2em; margin-top: 0; margin-bottom: 16px; }
.markdown-body code { font-family: SFMono-Regular, Consolas, "Liberation Mono", Menlo, monospace; font-size: 85%; background-color: rgba(27,31,35,0.05); border-radius: 3px; padding: 0.2em 0.4em; }
.markdown-body pre { padding: 16px; overflow: auto; font-size: 85%; line-height: 1.45; background-color: #f6f8fa; border-radius: 3px; margin-bottom: 16px; }
.markdown-body table { border-spacing: 0; border-collapse: collapse; margin-bottom: 16px; }
.markdown-body th, .markdown-body td { padding: 6px 13px; border: 1px solid #dfe2e5; }
.markdown-body th { font-weight: 600; }
.markdown-body hr { height: 0.25em; padding: 0; margin: 24px 0; background-color: #e1e4e8; border: 0; }
.markdown-body img { max-width: 100%; }
"#;

// ---------------------------------------------------------------------------
// Minimal theme
// ---------------------------------------------------------------------------
const MINIMAL_CSS: &str = r#"article {
  font-family: Helvetica, Arial, sans-serif;
  line-height: 1.7;
  color: #222;
}
h1, h2, h3, h4 { line-height: 1.3; margin-top: 1.5rem; }
h2 { font-size: 1.5rem; }
h3 { font-size: 1.25rem; }
a { color: #0066cc; }
pre { background: #f6f6f6; padding: 1rem; border-radius: 6px; font-size: 0.9rem; }
code { font-family: "Fira Code", monospace; font-size: 0.9em; }
blockquote { border-left: 3px solid #ddd; padding-left: 1rem; color: #555; }
table { width: 100%; border-collapse: collapse; }
th, td { border: 1px solid #ddd; padding: 0.5rem 0.75rem; text-align: left; }
th { background: #f6f6f6; font-weight: 600; }
hr { border: none; border-top: 1px solid #ddd; margin: 2rem 0; }
"#;

// ---------------------------------------------------------------------------
// Academic theme
// ---------------------------------------------------------------------------
const ACADEMIC_CSS: &str = r#"article {
  font-family: Georgia, "Times New Roman", serif;
  font-size: 17px;
  line-height: 1.8;
  color: #1a1a1a;
}
h1 { font-size: 1.9rem; text-align: center; font-weight: normal; }
h2 { font-size: 1.4rem; font-variant: small-caps; border-bottom: 1px solid #ccc; }
h3 { font-size: 1.15rem; font-style: italic; }
p { text-align: justify; }
blockquote { margin: 1rem 2rem; font-style: italic; color: #444; }
pre { background: #fafafa; border: 1px solid #e5e5e5; padding: 0.75rem; font-size: 0.85rem; }
code { font-family: "Courier New", monospace; }
table { border-collapse: collapse; margin: 1rem auto; }
th { border-top: 2px solid #000; border-bottom: 1px solid #000; padding: 0.4rem 0.8rem; }
td { padding: 0.4rem 0.8rem; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_themes_resolve() {
        for name in available_themes() {
            let theme = Theme::load(name, None).unwrap();
            assert_eq!(theme.name, name);
            assert!(!theme.css.is_empty());
        }
    }

    #[test]
    fn test_unknown_theme_is_an_error() {
        let err = Theme::load("no-such-theme", None).unwrap_err();
        assert!(matches!(err, ThemeError::NotFound(name) if name == "no-such-theme"));
    }

    #[test]
    fn test_themes_dir_shadows_builtin() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("github.css"), "p { color: red; }").unwrap();

        let theme = Theme::load("github", Some(temp_dir.path())).unwrap();
        assert_eq!(theme.css, "p { color: red; }");
    }

    #[test]
    fn test_themes_dir_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let theme = Theme::load("minimal", Some(temp_dir.path())).unwrap();
        assert_eq!(theme.name, "minimal");
    }
}
