//! HTML pages served to report viewers.
//!
//! Templates are compiled into the binary and registered with Tera once at
//! startup. Names ending in `.html` are auto-escaped.

use crate::error::RenderError;
use serde::Serialize;
use tera::{Context, Tera};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("templates/base.html")),
    ("login.html", include_str!("templates/login.html")),
    ("report.html", include_str!("templates/report.html")),
    ("error.html", include_str!("templates/error.html")),
];

#[derive(Debug, Clone, Serialize)]
pub struct LoginView<'a> {
    pub client_id: &'a str,
    pub login_path: &'a str,
    pub error: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportView<'a> {
    pub client_id: &'a str,
    pub year: &'a str,
    /// RFC 3339, empty when no window is open.
    pub window_expires_at: String,
    pub views_used: u32,
    pub max_views: u32,
    pub api_path: &'a str,
    pub logout_path: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorView<'a> {
    pub status: u16,
    pub message: &'a str,
}

/// Tera-backed renderer for the login, report and error pages.
pub struct ReportRenderer {
    tera: Tera,
}

impl ReportRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    /// Render a registered template with the given context.
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String, RenderError> {
        if !self.tera.get_template_names().any(|name| name == template_name) {
            return Err(RenderError::NotFound(template_name.to_string()));
        }
        Ok(self.tera.render(template_name, context)?)
    }

    pub fn login_page(&self, view: &LoginView<'_>) -> Result<String, RenderError> {
        self.render_view("login.html", view)
    }

    pub fn report_page(&self, view: &ReportView<'_>) -> Result<String, RenderError> {
        self.render_view("report.html", view)
    }

    pub fn error_page(&self, view: &ErrorView<'_>) -> Result<String, RenderError> {
        self.render_view("error.html", view)
    }

    fn render_view<T: Serialize>(&self, template_name: &str, view: &T) -> Result<String, RenderError> {
        let context = Context::from_serialize(view)?;
        self.render(template_name, &context)
    }
}
