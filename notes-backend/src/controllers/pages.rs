//! The notes page — server-rendered list + creation form + delete/sign-out.
//!
//! Every handler here is gated behind a valid session cookie; requests
//! without one are redirected to the identity provider's login page.
//! Outcomes (including degraded image uploads) surface as `notice`/`error`
//! banners via redirect query parameters.

use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, web};
use futures_util::StreamExt;
use serde::Deserialize;

use crate::AppState;
use crate::config::SESSION_COOKIE;
use crate::notes::Note;
use crate::notes::board::DeleteOutcome;

#[derive(Debug, Deserialize)]
struct PageQuery {
    notice: Option<String>,
    error: Option<String>,
}

fn redirect_to(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header(("Location", location.to_string()))
        .finish()
}

fn redirect_with(kind: &str, message: &str) -> HttpResponse {
    redirect_to(&format!("/?{}={}", kind, urlencoding::encode(message)))
}

/// Validate the session cookie against the identity provider.
/// Missing, invalid, or unverifiable sessions all redirect to login.
async fn require_session(
    state: &web::Data<AppState>,
    req: &HttpRequest,
) -> Result<String, HttpResponse> {
    let token = match req.cookie(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => return Err(redirect_to(&state.identity.login_url())),
    };

    match state.identity.validate(&token).await {
        Ok(true) => Ok(token),
        Ok(false) => Err(redirect_to(&state.identity.login_url())),
        Err(e) => {
            // Fail closed: an unreachable provider means no session
            log::error!("Session validation error: {}", e);
            Err(redirect_to(&state.identity.login_url()))
        }
    }
}

// --- Page ---

async fn index(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> HttpResponse {
    if let Err(resp) = require_session(&state, &req).await {
        return resp;
    }

    let mut error = query.error.clone();
    if let Err(e) = state.board.refresh().await {
        log::error!("Note list refresh failed: {}", e);
        let refresh_error = format!("Could not refresh notes: {}", e);
        error = Some(match error {
            Some(prev) => format!("{}; {}", prev, refresh_error),
            None => refresh_error,
        });
    }

    let notes = state.board.snapshot();
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(render_page(&notes, query.notice.as_deref(), error.as_deref()))
}

// --- Create ---

struct NoteForm {
    name: String,
    description: String,
    attachment: Option<(String, Vec<u8>)>,
}

/// Read the creation form fields from the multipart payload.
async fn read_note_form(payload: &mut Multipart) -> Result<NoteForm, String> {
    let mut name = String::new();
    let mut description = String::new();
    let mut attachment: Option<(String, Vec<u8>)> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| format!("Malformed form payload: {}", e))?;

        let field_name = field
            .content_disposition()
            .get_name()
            .unwrap_or("")
            .to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .map(|s| s.to_string());

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| format!("Failed to read form field '{}': {}", field_name, e))?;
            data.extend_from_slice(&chunk);
        }

        match field_name.as_str() {
            "name" => name = String::from_utf8_lossy(&data).trim().to_string(),
            "description" => description = String::from_utf8_lossy(&data).trim().to_string(),
            "image" => {
                // Browsers send an empty file part when no file was picked
                if let Some(f) = filename {
                    if !f.is_empty() && !data.is_empty() {
                        attachment = Some((f, data));
                    }
                }
            }
            _ => {}
        }
    }

    if name.is_empty() {
        return Err("Note name is required".to_string());
    }
    if description.is_empty() {
        return Err("Note description is required".to_string());
    }

    Ok(NoteForm { name, description, attachment })
}

async fn create_note(
    state: web::Data<AppState>,
    req: HttpRequest,
    mut payload: Multipart,
) -> HttpResponse {
    if let Err(resp) = require_session(&state, &req).await {
        return resp;
    }

    let form = match read_note_form(&mut payload).await {
        Ok(form) => form,
        Err(e) => return redirect_with("error", &e),
    };

    match state.board.create(&form.name, &form.description, form.attachment).await {
        Ok(outcome) if outcome.image_degraded => {
            redirect_with("error", "Note created, but the image upload failed")
        }
        Ok(_) => redirect_with("notice", "Note created"),
        Err(e) => {
            log::error!("Create note failed: {}", e);
            redirect_with("error", &format!("Could not create note: {}", e))
        }
    }
}

// --- Delete ---

async fn delete_note(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    if let Err(resp) = require_session(&state, &req).await {
        return resp;
    }

    let id = path.into_inner();
    match state.board.delete(&id).await {
        DeleteOutcome::Deleted => redirect_with("notice", "Note deleted"),
        DeleteOutcome::NotFound => redirect_with("error", "Note not found"),
        DeleteOutcome::Failed { error } => {
            log::error!("Backend delete failed for note {}: {}", id, error);
            // Resync policy: the note was already removed locally, so pull
            // the backend's view back in before showing the page again.
            if let Err(e) = state.board.refresh().await {
                log::error!("Resync after failed delete also failed: {}", e);
            }
            redirect_with("error", &format!("Could not delete note: {}", error))
        }
    }
}

// --- Sign out ---

async fn sign_out(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        // Local sign-out proceeds even if the provider call fails
        if let Err(e) = state.identity.sign_out(cookie.value()).await {
            log::warn!("Provider sign-out failed: {}", e);
        }
    }

    let mut resp = redirect_to(&state.identity.login_url());
    let mut cookie = actix_web::cookie::Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    if let Err(e) = resp.add_removal_cookie(&cookie) {
        log::warn!("Failed to clear session cookie: {}", e);
    }
    resp
}

// --- Rendering ---

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn render_banner(out: &mut String, class: &str, message: Option<&str>) {
    if let Some(message) = message {
        out.push_str(&format!(
            "<p class=\"banner {}\">{}</p>\n",
            class,
            escape_html(message)
        ));
    }
}

fn render_note(out: &mut String, note: &Note) {
    out.push_str("<li class=\"note\">");
    out.push_str(&format!("<strong>{}</strong> ", escape_html(&note.name)));
    out.push_str(&format!("<span>{}</span> ", escape_html(&note.description)));
    match (&note.image_key, &note.image_url) {
        (Some(_), Some(url)) => {
            out.push_str(&format!(
                "<img src=\"{}\" alt=\"attachment for {}\" width=\"400\"> ",
                escape_html(url),
                escape_html(&note.name)
            ));
        }
        (Some(_), None) => {
            // Attachment exists but its URL could not be resolved
            out.push_str("<span class=\"image-missing\">image unavailable</span> ");
        }
        _ => {}
    }
    out.push_str(&format!(
        "<form method=\"post\" action=\"/notes/{}/delete\"><button type=\"submit\">Delete note</button></form>",
        escape_html(&urlencoding::encode(&note.id))
    ));
    out.push_str("</li>\n");
}

fn render_page(notes: &[Note], notice: Option<&str>, error: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>My Notes App</title></head>\n<body>\n");
    out.push_str("<h1>My Notes App</h1>\n");

    render_banner(&mut out, "notice", notice);
    render_banner(&mut out, "error", error);

    out.push_str(
        "<form method=\"post\" action=\"/notes\" enctype=\"multipart/form-data\">\n\
         <input name=\"name\" placeholder=\"Note Name\" required>\n\
         <input name=\"description\" placeholder=\"Note Description\" required>\n\
         <input name=\"image\" type=\"file\">\n\
         <button type=\"submit\">Create Note</button>\n\
         </form>\n",
    );

    out.push_str("<h2>Current Notes</h2>\n<ul>\n");
    for note in notes {
        render_note(&mut out, note);
    }
    out.push_str("</ul>\n");

    out.push_str(
        "<form method=\"post\" action=\"/signout\"><button type=\"submit\">Sign Out</button></form>\n",
    );
    out.push_str("</body>\n</html>\n");
    out
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/notes", web::post().to(create_note))
        .route("/notes/{id}/delete", web::post().to(delete_note))
        .route("/signout", web::post().to(sign_out));
}
