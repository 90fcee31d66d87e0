//! HTML fragment for the chat widget.
//!
//! Every scraped or configured string is escaped; the storefront's markup
//! is not trusted.

use storefront_chat::{ChatResponse, DocSnippet, Link, PagePreview, Product};

const BUTTON_STYLE: &str = "display:inline-block;background:#111;color:#fff;padding:10px 14px;\
                            border-radius:10px;text-decoration:none;font-weight:700;margin:4px 6px 0 0";
const PANEL_STYLE: &str = "margin-top:10px;padding:10px;border:1px solid #eee;border-radius:10px;background:#fff";

/// Message returned when the pipeline itself fails.
pub const SERVER_ERROR_HTML: &str = "Server error. Try again shortly.";

/// Escape text for HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a chat result as a self-contained HTML fragment.
pub fn render(response: &ChatResponse) -> String {
    let mut html = String::from(r#"<div style="font-size:14px">"#);

    html.push_str(&format!(
        r#"<div style="margin:4px 0 8px 0;font-weight:800">{}</div>"#,
        escape_html(&response.heading)
    ));

    if let Some(preview) = &response.preview {
        html.push_str(&preview_card(preview));
    }
    if !response.message.is_empty() {
        html.push_str(&format!(
            r#"<div style="font-size:13px;line-height:1.45">{}</div>"#,
            escape_html(&response.message)
        ));
    }
    if !response.tips.is_empty() {
        html.push_str(r#"<ul style="padding-left:18px;margin:8px 0 0 0;font-size:13px;line-height:1.45">"#);
        for tip in &response.tips {
            html.push_str(&format!("<li>{}</li>", escape_html(tip)));
        }
        html.push_str("</ul>");
    }
    if !response.items.is_empty() {
        html.push_str(&gallery(&response.items));
    }
    if !response.requested.is_empty() {
        html.push_str(&format!(r#"<div style="{PANEL_STYLE}">"#));
        html.push_str(r#"<div style="font-weight:800;margin-bottom:6px">Currently out of stock</div>"#);
        for product in &response.requested {
            html.push_str(&compact_row(product));
        }
        html.push_str("</div>");
    }
    if !response.picks.is_empty() {
        html.push_str(&format!(r#"<div style="{PANEL_STYLE}">"#));
        html.push_str(r#"<div style="font-weight:800;margin-bottom:6px">Top Picks</div>"#);
        for product in &response.picks {
            html.push_str(&compact_row(product));
        }
        html.push_str("</div>");
    }
    if let Some(snippet) = &response.snippet {
        html.push_str(&snippet_panel(snippet));
    }
    if let Some(prompt) = &response.prompt {
        html.push_str(&format!(
            r#"<div style="margin-top:10px;padding:10px;border:1px dashed #ddd;border-radius:10px;background:#fff"><div style="font-weight:700">{}</div></div>"#,
            escape_html(prompt)
        ));
    }
    if !response.links.is_empty() {
        html.push_str(r#"<div style="margin-top:8px">"#);
        for link in &response.links {
            html.push_str(&button(link));
        }
        html.push_str("</div>");
    }

    html.push_str("</div>");
    html
}

fn gallery(items: &[Product]) -> String {
    let mut html = String::from(
        r#"<div style="display:grid;grid-template-columns:repeat(auto-fill,minmax(180px,1fr));gap:10px">"#,
    );
    for p in items {
        html.push_str(&format!(
            r#"<a href="{}" target="_blank" rel="noopener" style="text-decoration:none;color:inherit"><div style="border:1px solid #eee;border-radius:12px;padding:10px">"#,
            escape_html(&p.url)
        ));
        if !p.image.is_empty() {
            html.push_str(&format!(
                r#"<img src="{}" alt="" style="width:100%;height:120px;object-fit:cover;border-radius:8px">"#,
                escape_html(&p.image)
            ));
        }
        html.push_str(&format!(
            r#"<div style="font-weight:600;margin-top:8px;font-size:13px;line-height:1.2">{}</div>"#,
            escape_html(&p.title)
        ));
        if !p.price.is_empty() {
            html.push_str(&format!(
                r#"<div style="opacity:.85;margin-top:4px">{}</div>"#,
                escape_html(&p.price)
            ));
        }
        html.push_str("</div></a>");
    }
    html.push_str("</div>");
    html
}

fn compact_row(p: &Product) -> String {
    let image = if p.image.is_empty() {
        String::new()
    } else {
        format!(
            r#"<img src="{}" alt="" style="width:42px;height:42px;object-fit:cover;border-radius:6px">"#,
            escape_html(&p.image)
        )
    };
    let price = if p.price.is_empty() {
        String::new()
    } else {
        format!(
            r#"<div style="opacity:.85;margin-top:2px">{}</div>"#,
            escape_html(&p.price)
        )
    };
    format!(
        r#"<a href="{url}" target="_blank" rel="noopener" style="text-decoration:none;color:inherit"><div style="display:flex;gap:8px;align-items:center;padding:6px 0;border-top:1px solid #f2f2f2">{image}<div style="flex:1;font-size:13px;line-height:1.25"><div style="font-weight:600">{title}</div>{price}</div></div></a>"#,
        url = escape_html(&p.url),
        title = escape_html(&p.title),
    )
}

fn preview_card(preview: &PagePreview) -> String {
    let image = if preview.image.is_empty() {
        String::new()
    } else {
        format!(
            r#"<img src="{}" alt="" style="width:56px;height:56px;object-fit:cover;border-radius:8px">"#,
            escape_html(&preview.image)
        )
    };
    format!(
        r#"<div style="margin:4px 0 8px 0;padding:10px;border:1px solid #eee;border-radius:10px;background:#fafafa;display:flex;gap:10px;align-items:center">{image}<div style="flex:1;font-weight:700">{}</div></div>"#,
        escape_html(&preview.title)
    )
}

fn snippet_panel(snippet: &DocSnippet) -> String {
    format!(
        r#"<div style="{PANEL_STYLE}"><div style="font-weight:800;margin-bottom:6px"><a href="{}" target="_blank" rel="noopener">{}</a></div><div style="font-size:13px;line-height:1.45">{}</div></div>"#,
        escape_html(&snippet.url),
        escape_html(&snippet.title),
        escape_html(&snippet.snippet)
    )
}

fn button(link: &Link) -> String {
    format!(
        r#"<a href="{}" target="_blank" rel="noopener" style="{BUTTON_STYLE}">{}</a>"#,
        escape_html(&link.url),
        escape_html(&link.label)
    )
}
