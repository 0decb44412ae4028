//! HTML rendering of workflow view models.

use minijinja::{context, Environment};

use crate::error::{AppError, AppResult};
use crate::workflow::ViewModel;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("templates/base.html")),
    ("auth.html", include_str!("templates/auth.html")),
    ("dashboard.html", include_str!("templates/dashboard.html")),
];

/// Template set compiled once at startup. `.html` templates are auto-escaped.
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> AppResult<Self> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| AppError::internal("template_error".to_string(), format!("{}: {}", name, e)))?;
        }
        Ok(Self { env })
    }

    pub fn render(&self, view: &ViewModel) -> AppResult<String> {
        let (name, ctx) = match view {
            ViewModel::Auth(v) => ("auth.html", context! { view => v }),
            ViewModel::Dashboard(v) => ("dashboard.html", context! { view => v }),
        };
        let tmpl = self.env.get_template(name).map_err(|e| AppError::internal("template_error".to_string(), e.to_string()))?;
        tmpl.render(ctx).map_err(|e| AppError::internal("template_error".to_string(), e.to_string()))
    }
}
