//! HTML to plain-text flattening for message bodies.

/// Flatten an HTML body into plain text suitable for a PDF text page.
///
/// - Block elements (`<p>`, `<div>`, `<br>`, `<tr>`, headings) become line breaks
/// - `<li>` items are prefixed with `"- "`
/// - `<script>` and `<style>` blocks are dropped entirely
/// - Common entities are decoded
/// - Runs of blank lines collapse to one
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");
    text = remove_tag_block(&text, "head");

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '<' {
            out.push(ch);
            continue;
        }
        let mut tag = String::new();
        for c in chars.by_ref() {
            if c == '>' {
                break;
            }
            tag.push(c);
        }
        match tag_name(&tag).as_str() {
            "br" | "p" | "/p" | "div" | "/div" | "tr" | "/tr" | "h1" | "h2" | "h3"
            | "h4" | "h5" | "h6" | "/h1" | "/h2" | "/h3" | "/h4" | "/h5" | "/h6" | "/table" => {
                out.push('\n')
            }
            "li" => out.push_str("\n- "),
            "td" | "th" => out.push(' '),
            _ => {}
        }
    }

    let decoded = decode_entities(&out);

    let mut cleaned = String::with_capacity(decoded.len());
    let mut prev_was_blank = false;
    for line in decoded.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank && !cleaned.is_empty() {
                cleaned.push('\n');
            }
            prev_was_blank = true;
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

/// Lower-cased tag name, keeping a leading `/` for closing tags.
fn tag_name(tag: &str) -> String {
    let tag = tag.trim();
    let (prefix, rest) = match tag.strip_prefix('/') {
        Some(rest) => ("/", rest.trim_start()),
        None => ("", tag),
    };
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    format!("{prefix}{}", name.to_ascii_lowercase())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    // ASCII lowering keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find(&open) {
        let start = pos + rel;
        let after_name = start + open.len();
        let boundary = lower[after_name..]
            .chars()
            .next()
            .is_none_or(|c| c == '>' || c == '/' || c.is_whitespace());
        if !boundary {
            result.push_str(&html[pos..after_name]);
            pos = after_name;
            continue;
        }
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}
