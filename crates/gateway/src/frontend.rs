//! The prompt form page.
//!
//! A single server-rendered page: a text box for the prompt and, after a
//! submission, the prompt and the agent's answer. The browser's
//! continuation session lives in a signed cookie.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info};
use unitypilot_core::message::SessionId;

use crate::GatewayState;

pub const PROMPT_REQUIRED: &str = "prompt is required.";
pub const QUERY_FAILED: &str = "Could not process query.";

#[derive(Debug, Default)]
pub struct PageView<'a> {
    pub flash: Option<&'a str>,
    pub prompt: Option<&'a str>,
    pub answer: Option<&'a str>,
}

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_page(view: &PageView<'_>) -> String {
    let mut body = String::new();

    if let Some(flash) = view.flash {
        body.push_str(&format!(
            "    <p class=\"flash\" role=\"alert\">{}</p>\n",
            escape_html(flash)
        ));
    }

    body.push_str(&format!(
        "    <form method=\"post\" action=\"/\">\n      \
         <label for=\"prompt\">What should happen in the Unity Editor?</label>\n      \
         <textarea id=\"prompt\" name=\"prompt\" rows=\"4\" cols=\"60\">{}</textarea>\n      \
         <button type=\"submit\">Send</button>\n    </form>\n",
        escape_html(view.prompt.unwrap_or_default())
    ));

    if let Some(answer) = view.answer {
        body.push_str(&format!(
            "    <section class=\"answer\">\n      <h2>Answer</h2>\n      <pre>{}</pre>\n    </section>\n",
            escape_html(answer)
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"utf-8\">\n    \
         <title>UnityPilot</title>\n  </head>\n  <body>\n    <h1>UnityPilot</h1>\n{body}  </body>\n</html>\n"
    )
}

#[derive(Debug, Deserialize)]
pub struct PromptForm {
    #[serde(default)]
    prompt: String,
}

pub async fn index_handler() -> Html<String> {
    Html(render_page(&PageView::default()))
}

pub async fn submit_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Form(form): Form<PromptForm>,
) -> Response {
    let prompt = form.prompt.trim();
    if prompt.is_empty() {
        return Html(render_page(&PageView {
            flash: Some(PROMPT_REQUIRED),
            ..PageView::default()
        }))
        .into_response();
    }

    let (session, issued) = match state.cookies.session_from(&headers) {
        Some(id) => (id, false),
        None => (SessionId::new(), true),
    };
    info!(session_id = %session, prompt_len = prompt.len(), "Form query received");

    let mut response = match state.runner.run_query(Some(&session), prompt).await {
        Ok(answer) => Html(render_page(&PageView {
            prompt: Some(prompt),
            answer: Some(&answer),
            ..PageView::default()
        }))
        .into_response(),
        Err(e) => {
            error!(session_id = %session, error = %e, "Form query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_page(&PageView {
                    flash: Some(QUERY_FAILED),
                    prompt: Some(prompt),
                    ..PageView::default()
                })),
            )
                .into_response()
        }
    };

    if issued && let Ok(value) = state.cookies.set_cookie(&session).parse() {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}
