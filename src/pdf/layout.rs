//! Text layout: wrapping by display width and pagination into page items.

use unicode_width::UnicodeWidthChar;

/// Page margin on all four sides, in points.
pub const MARGIN: f32 = 50.0;

/// Line height as a multiple of the font size.
pub const LEADING: f32 = 1.25;

/// Vertical space taken by a horizontal rule.
const RULE_HEIGHT: f32 = 8.0;

/// Tab stops used when expanding tabs.
const TAB_WIDTH: usize = 4;

/// Paper size of generated pages (attachment images size their own page).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// `(width, height)` in points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            Self::A4 => (595.0, 842.0),
            Self::Letter => (612.0, 792.0),
        }
    }

    /// Height available for content between the margins.
    pub fn usable_height(self) -> f32 {
        self.dimensions().1 - 2.0 * MARGIN
    }
}

impl std::str::FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a4" => Ok(Self::A4),
            "letter" => Ok(Self::Letter),
            other => Err(format!("unknown page size '{other}' (expected a4 or letter)")),
        }
    }
}

/// Built-in Type 1 fonts available on generated pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
    Mono,
}

impl Font {
    pub const ALL: [Font; 3] = [Font::Regular, Font::Bold, Font::Mono];

    /// Name of the font in the page resource dictionary.
    pub fn resource_name(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
            Self::Mono => "F3",
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            Self::Regular => "Helvetica",
            Self::Bold => "Helvetica-Bold",
            Self::Mono => "Courier",
        }
    }
}

/// One vertical slot on a generated page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    Text { text: String, font: Font, size: f32 },
    Rule,
    Space(f32),
}

impl PageItem {
    pub fn text(text: impl Into<String>, font: Font, size: f32) -> Self {
        Self::Text {
            text: text.into(),
            font,
            size,
        }
    }

    /// Vertical space consumed by this item.
    pub fn height(&self) -> f32 {
        match self {
            Self::Text { size, .. } => size * LEADING,
            Self::Rule => RULE_HEIGHT,
            Self::Space(h) => *h,
        }
    }
}

/// Wrap `text` to at most `width` display columns per line.
///
/// Breaks at the last space that fits; words longer than a line are split.
/// Tabs expand to spaces, blank lines are kept, trailing spaces dropped.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();

    for raw_line in text.lines() {
        let line = expand_tabs(raw_line);
        let line = line.trim_end();
        if line.is_empty() {
            out.push(String::new());
            continue;
        }

        let mut current = String::new();
        let mut current_width = 0usize;
        // Byte index and column of the last space in `current`.
        let mut last_space: Option<(usize, usize)> = None;

        for ch in line.chars() {
            let w = ch.width().unwrap_or(0);
            if current_width + w > width {
                if ch == ' ' {
                    out.push(current.trim_end().to_string());
                    current.clear();
                    current_width = 0;
                    last_space = None;
                    continue;
                }
                match last_space {
                    Some((idx, col)) if idx > 0 => {
                        let rest = current.split_off(idx + 1);
                        out.push(current.trim_end().to_string());
                        current = rest;
                        current_width -= col + 1;
                    }
                    _ if !current.is_empty() => {
                        out.push(std::mem::take(&mut current));
                        current_width = 0;
                    }
                    _ => {}
                }
                last_space = None;
            }
            if ch == ' ' {
                last_space = Some((current.len(), current_width));
            }
            current.push(ch);
            current_width += w;
        }
        out.push(current.trim_end().to_string());
    }

    out
}

fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + TAB_WIDTH);
    let mut col = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = TAB_WIDTH - col % TAB_WIDTH;
            out.extend(std::iter::repeat_n(' ', pad));
            col += pad;
        } else {
            out.push(ch);
            col += ch.width().unwrap_or(0);
        }
    }
    out
}

/// Wrap `text` and turn each line into a text item.
pub fn text_items(text: &str, font: Font, size: f32, width: usize) -> Vec<PageItem> {
    wrap(text, width)
        .into_iter()
        .map(|line| PageItem::text(line, font, size))
        .collect()
}

/// Split items into pages that fit between the margins.
///
/// Always returns at least one (possibly empty) page.
pub fn paginate(items: Vec<PageItem>, page: PageSize) -> Vec<Vec<PageItem>> {
    let usable = page.usable_height();
    let mut pages = Vec::new();
    let mut current = Vec::new();
    let mut used = 0.0f32;

    for item in items {
        let h = item.height();
        if used + h > usable && !current.is_empty() {
            pages.push(std::mem::take(&mut current));
            used = 0.0;
            // Leading whitespace on a fresh page is noise.
            if matches!(item, PageItem::Space(_)) {
                continue;
            }
        }
        used += h;
        current.push(item);
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_at_word_boundary() {
        assert_eq!(wrap("hello world foo", 11), vec!["hello world", "foo"]);
        assert_eq!(wrap("one two three", 8), vec!["one two", "three"]);
    }

    #[test]
    fn test_wrap_splits_long_words() {
        assert_eq!(wrap("aaaaaaaaaaaa", 5), vec!["aaaaa", "aaaaa", "aa"]);
    }

    #[test]
    fn test_wrap_keeps_blank_lines() {
        assert_eq!(wrap("a\n\nb\r\n", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn test_wrap_uses_display_width() {
        // CJK characters are two columns wide.
        assert_eq!(wrap("日本語です", 4), vec!["日本", "語で", "す"]);
    }

    #[test]
    fn test_wrap_expands_tabs() {
        assert_eq!(wrap("a\tb", 80), vec!["a   b"]);
    }

    #[test]
    fn test_wrap_empty_text() {
        assert!(wrap("", 10).is_empty());
    }

    #[test]
    fn test_paginate_always_one_page() {
        let pages = paginate(Vec::new(), PageSize::A4);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn test_paginate_splits_by_height() {
        let size = 10.0;
        let per_page = (PageSize::A4.usable_height() / (size * LEADING)) as usize;
        let items: Vec<PageItem> = (0..per_page * 2 + 1)
            .map(|i| PageItem::text(i.to_string(), Font::Mono, size))
            .collect();
        let pages = paginate(items, PageSize::A4);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), per_page);
        assert_eq!(pages[2].len(), 1);
    }

    #[test]
    fn test_page_size_parse() {
        assert_eq!("Letter".parse::<PageSize>(), Ok(PageSize::Letter));
        assert!("legal".parse::<PageSize>().is_err());
    }
}
