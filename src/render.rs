//! Template interpolation and body preparation.
//!
//! Placeholders use Handlebars syntax: `{{name}}`, or `{{user.name}}` for
//! nested data. Values are inserted verbatim (no HTML escaping) and missing
//! variables render as the empty string. Only variable substitution is
//! supported: the names of the Handlebars built-in helpers (`if`, `each`,
//! `lookup`, `log`, ...) are rebound to plain variable lookups, so data keys
//! with those names substitute like any other.
//!
//! ```
//! use serde_json::json;
//! use stencil_mail::render::interpolate;
//!
//! let data = json!({ "name": "Ann" });
//! let out = interpolate("Hi {{name}}{{missing}}!", data.as_object().unwrap()).unwrap();
//! assert_eq!(out, "Hi Ann!");
//! ```

use handlebars::{Context, Handlebars, Helper, HelperResult, JsonRender, Output, RenderContext};
use scraper::{ElementRef, Html, Node};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::error::MailError;

/// Column the text fallback wraps at.
pub const WORD_WRAP: usize = 130;

/// A subject/text/html triple after interpolation.
///
/// Parts absent from the source template stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedMessage {
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
}

/// Unrendered subject/text/html sources, ready for interpolation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParts {
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
}

impl TemplateParts {
    /// Prepare stored bodies for rendering.
    ///
    /// Both bodies are entity-decoded. When the text body is missing or empty
    /// and the html body is not, a text body is derived from the html.
    /// Empty bodies are dropped.
    pub fn from_stored(subject: Option<&str>, html: Option<&str>, text: Option<&str>) -> Self {
        let html = non_empty(html).map(decode_entities);
        let text = match non_empty(text) {
            Some(text) => Some(decode_entities(text)),
            None => html.as_deref().map(html_to_text),
        };

        Self {
            subject: non_empty(subject).map(str::to_string),
            text: text.filter(|t| !t.is_empty()),
            html,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// String-template renderer.
///
/// Holds a Handlebars registry configured for raw substitution. Rendering is
/// a pure function of the template and the data.
pub struct Renderer {
    registry: Handlebars<'static>,
}

/// Names Handlebars registers helpers under out of the box.
const BUILTIN_HELPERS: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "raw", "log", "eq", "ne", "gt", "gte", "lt", "lte",
    "and", "or", "not", "len",
];

impl Renderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        for name in BUILTIN_HELPERS {
            registry.register_helper(name, Box::new(variable_helper));
        }
        Self { registry }
    }

    /// Render one template string against `data`.
    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String, MailError> {
        Ok(self.registry.render_template(template, data)?)
    }

    /// Render every present part of `parts` against `data`.
    pub fn compose<T: Serialize>(
        &self,
        parts: &TemplateParts,
        data: &T,
    ) -> Result<ComposedMessage, MailError> {
        let render = |part: &Option<String>| -> Result<Option<String>, MailError> {
            part.as_deref()
                .map(|source| self.render(source, data))
                .transpose()
        };

        Ok(ComposedMessage {
            subject: render(&parts.subject)?,
            text: render(&parts.text)?,
            html: render(&parts.html)?,
        })
    }
}

// `{{name}}` where `name` is also a helper name: substitute the variable.
fn variable_helper(
    h: &Helper,
    _: &Handlebars,
    ctx: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    if let Some(value) = ctx.data().get(h.name()) {
        out.write(&value.render())?;
    }
    Ok(())
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn shared_renderer() -> &'static Renderer {
    static RENDERER: OnceLock<Renderer> = OnceLock::new();
    RENDERER.get_or_init(Renderer::new)
}

/// Interpolate `data` into `template`.
pub fn interpolate(template: &str, data: &Map<String, Value>) -> Result<String, MailError> {
    shared_renderer().render(template, data)
}

/// Decode HTML entities (`&amp;`, `&lt;`, `&#39;`, ...).
pub fn decode_entities(input: &str) -> String {
    html_escape::decode_html_entities(input).into_owned()
}

/// Elements whose content never reaches the text body.
const HIDDEN: &[&str] = &["head", "title", "style", "script", "noscript", "template"];

/// Elements rendered on lines of their own.
const BLOCKS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "table", "thead", "tbody",
    "tfoot", "tr", "blockquote", "section", "article", "header", "footer", "hr", "center",
];

enum Segment {
    /// Running text: whitespace collapses and lines wrap.
    Flow(String),
    /// `<pre>` content, kept line for line.
    Pre(String),
}

#[derive(Default)]
struct TextWriter {
    segments: Vec<Segment>,
    flow: String,
}

impl TextWriter {
    fn text(&mut self, text: &str) {
        // Source newlines are plain whitespace in html.
        self.flow
            .extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
    }

    fn line_break(&mut self) {
        self.flow.push('\n');
    }

    fn preformatted(&mut self, text: String) {
        self.flush();
        self.segments.push(Segment::Pre(text));
    }

    fn flush(&mut self) {
        if !self.flow.is_empty() {
            self.segments.push(Segment::Flow(std::mem::take(&mut self.flow)));
        }
    }

    fn finish(mut self) -> String {
        self.flush();

        let mut lines = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Flow(text) => {
                    for line in text.lines() {
                        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
                        if !line.is_empty() {
                            wrap_line(&line, WORD_WRAP, &mut lines);
                        }
                    }
                }
                Segment::Pre(text) => lines.extend(
                    text.lines()
                        .map(str::trim_end)
                        .filter(|line| !line.is_empty())
                        .map(str::to_string),
                ),
            }
        }
        lines.join("\n")
    }
}

fn collect_text(el: ElementRef) -> String {
    el.text().fold(String::new(), |mut acc, chunk| {
        acc += chunk;
        acc
    })
}

fn walk_children(el: ElementRef, out: &mut TextWriter) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.text(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    walk_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn walk_element(el: ElementRef, out: &mut TextWriter) {
    let name = el.value().name();
    match name {
        _ if HIDDEN.contains(&name) => {}
        "br" => out.line_break(),
        "li" => {
            out.line_break();
            out.text("* ");
            walk_children(el, out);
            out.line_break();
        }
        "a" => {
            let href = el.value().attr("href").unwrap_or_default().trim();
            let label = collect_text(el);
            let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
            if label.is_empty() || label == href {
                out.text(href);
            } else if href.is_empty() {
                out.text(&label);
            } else {
                out.text(&format!("{} [{}]", label, href));
            }
        }
        "td" | "th" => {
            walk_children(el, out);
            out.text(" ");
        }
        "pre" => {
            out.line_break();
            out.preformatted(collect_text(el));
            out.line_break();
        }
        _ if BLOCKS.contains(&name) => {
            out.line_break();
            walk_children(el, out);
            out.line_break();
        }
        _ => walk_children(el, out),
    }
}

/// Derive a plain-text body from html.
///
/// The html is parsed as a document. Head, style and script content is
/// dropped, block elements become line breaks, list items become `* `
/// bullets and links become `text [href]`. Whitespace is collapsed, empty
/// lines are removed and lines are word-wrapped at [`WORD_WRAP`]. `<pre>`
/// content keeps its own lines and spacing.
///
/// ```
/// use stencil_mail::render::html_to_text;
///
/// let text = html_to_text("<h1>Welcome</h1><p>Hi <b>Ann</b> &amp; co</p>");
/// assert_eq!(text, "Welcome\nHi Ann & co");
/// ```
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = TextWriter::default();
    walk_element(document.root_element(), &mut out);
    out.finish()
}

// Greedy wrap on whitespace. Words longer than `width` are kept whole.
fn wrap_line(line: &str, width: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    for word in line.split(' ').filter(|w| !w.is_empty()) {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_interpolate_variables() {
        let out = interpolate(
            "Hello {{name}} from {{company.name}}!",
            &data(json!({ "name": "Ann", "company": { "name": "Acme" } })),
        )
        .unwrap();
        assert_eq!(out, "Hello Ann from Acme!");
    }

    #[test]
    fn test_interpolate_missing_variable_is_empty() {
        let out = interpolate("Hi {{name}}.", &Map::new()).unwrap();
        assert_eq!(out, "Hi .");
    }

    #[test]
    fn test_interpolate_does_not_escape() {
        let out = interpolate("{{link}}", &data(json!({ "link": "<a href=\"x\">x</a> & y" }))).unwrap();
        assert_eq!(out, "<a href=\"x\">x</a> & y");
    }

    #[test]
    fn test_interpolate_malformed_template() {
        let err = interpolate("Hi {{name", &Map::new()).unwrap_err();
        assert!(matches!(err, MailError::TemplateError(_)));
    }

    #[test]
    fn test_compose_skips_absent_parts() {
        let parts = TemplateParts {
            subject: Some("Hi {{name}}".into()),
            text: None,
            html: Some("<p>{{name}}</p>".into()),
        };
        let composed = Renderer::new()
            .compose(&parts, &json!({ "name": "Ann" }))
            .unwrap();

        assert_eq!(composed.subject.as_deref(), Some("Hi Ann"));
        assert_eq!(composed.text, None);
        assert_eq!(composed.html.as_deref(), Some("<p>Ann</p>"));
    }

    #[test]
    fn test_from_stored_derives_text_fallback() {
        let parts = TemplateParts::from_stored(Some("Hi"), Some("<p>Hi {{name}}</p>"), Some(""));
        assert_eq!(parts.text.as_deref(), Some("Hi {{name}}"));

        let composed = Renderer::new()
            .compose(&parts, &json!({ "name": "Ann" }))
            .unwrap();
        let text = composed.text.unwrap();
        assert!(text.contains("Hi Ann"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_from_stored_keeps_explicit_text() {
        let parts = TemplateParts::from_stored(None, Some("<p>html</p>"), Some("plain"));
        assert_eq!(parts.text.as_deref(), Some("plain"));
        assert_eq!(parts.subject, None);
    }

    #[test]
    fn test_from_stored_decodes_entities_consistently() {
        let parts = TemplateParts::from_stored(
            None,
            Some("&lt;p&gt;Caf&eacute; {{name}}&lt;/p&gt;"),
            None,
        );
        assert_eq!(parts.html.as_deref(), Some("<p>Café {{name}}</p>"));
        assert_eq!(parts.text.as_deref(), Some("Café {{name}}"));
    }

    #[test]
    fn test_from_stored_without_bodies() {
        let parts = TemplateParts::from_stored(Some("s"), None, None);
        assert_eq!(parts.html, None);
        assert_eq!(parts.text, None);

        let parts = TemplateParts::from_stored(Some("s"), Some(""), Some(""));
        assert_eq!(parts.html, None);
        assert_eq!(parts.text, None);
    }

    #[test]
    fn test_html_to_text_structure() {
        let html = r#"<html><head><title>x</title><style>p { color: red }</style></head>
            <body>
              <h1>Order   shipped</h1>
              <p>Line one<br>Line two</p>

              <ul><li>First</li><li>Second</li></ul>
              <p>See <a href="https://example.com/track">tracking</a> or <a href="https://example.com">https://example.com</a></p>
              <script>alert(1)</script>
            </body></html>"#;

        assert_eq!(
            html_to_text(html),
            "Order shipped\nLine one\nLine two\n* First\n* Second\n\
             See tracking [https://example.com/track] or https://example.com"
        );
    }

    #[test]
    fn test_html_to_text_wraps_long_lines() {
        let word = "word ";
        let html = format!("<p>{}</p>", word.repeat(60));
        let text = html_to_text(&html);

        assert!(text.lines().count() > 1);
        assert!(text.lines().all(|l| l.chars().count() <= WORD_WRAP));
        assert_eq!(text.split_whitespace().count(), 60);
    }

    #[test]
    fn test_html_to_text_quoted_angle_brackets_in_attributes() {
        assert_eq!(
            html_to_text(r#"<p>Hi <img alt="a > b" src="x.png"> there</p>"#),
            "Hi there"
        );
        assert_eq!(html_to_text(r#"<p data-x="1>2">Hi {{name}}</p>"#), "Hi {{name}}");
        assert_eq!(
            html_to_text(r#"<p><a title="next >" href="https://example.com/a?b=1&amp;c=2">Go</a></p>"#),
            "Go [https://example.com/a?b=1&c=2]"
        );
    }

    #[test]
    fn test_html_to_text_keeps_preformatted_lines() {
        let html = "<p>Your   code:</p><pre>  let x = 1;\n\n      x + 1</pre><p>Thanks</p>";
        assert_eq!(
            html_to_text(html),
            "Your code:\n  let x = 1;\n      x + 1\nThanks"
        );
    }

    #[test]
    fn test_html_to_text_tables_and_comments() {
        let html = "<!-- preheader --><table><tr><td>Total</td><td>$10</td></tr></table>";
        assert_eq!(html_to_text(html), "Total $10");
    }

    #[test]
    fn test_helper_names_are_plain_variables() {
        let out = interpolate(
            "<p>{{log}} {{lookup}} {{if}} {{each}}</p>",
            &data(json!({ "log": "L", "lookup": "K", "if": "I", "each": 3 })),
        )
        .unwrap();
        assert_eq!(out, "<p>L K I 3</p>");

        let out = interpolate("{{with}}|{{len}}", &Map::new()).unwrap();
        assert_eq!(out, "|");
    }

    #[test]
    fn test_wrap_keeps_overlong_words_whole() {
        let long = "x".repeat(WORD_WRAP + 10);
        let mut out = Vec::new();
        wrap_line(&format!("a {} b", long), WORD_WRAP, &mut out);
        assert_eq!(out, vec!["a".to_string(), long, "b".to_string()]);
    }
}
