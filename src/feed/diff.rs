//! Extraction of added text from the wiki's HTML diff tables.
//!
//! Diffs arrive either as a full `<table>` (inside a feed description) or as a
//! bare run of `<tr>` rows (from the revision and comparison APIs). Both shapes
//! go through [`extract_insertions`].

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static EMPTY_CELL: LazyLock<Selector> = LazyLock::new(|| selector("td.diff-empty"));
static ADDED_CELL: LazyLock<Selector> = LazyLock::new(|| selector("td.diff-addedline"));
static CELL_DIV: LazyLock<Selector> = LazyLock::new(|| selector("div"));
static MULTI_MARKER: LazyLock<Selector> = LazyLock::new(|| selector(".diff-multi"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// Returns the text of every pure-insertion row, in document order.
///
/// A pure insertion is a row whose left side is empty and whose right side is
/// an added line. Rows that modify an existing line are skipped, as are
/// deletions and context rows. An added blank line yields `""`.
pub fn extract_insertions(fragment: &str) -> Vec<String> {
    let document = parse_rows(fragment);

    document
        .select(&ROW)
        .filter(|row| row.select(&EMPTY_CELL).next().is_some())
        .filter_map(|row| row.select(&ADDED_CELL).next())
        .map(|cell| match cell.select(&CELL_DIV).next() {
            Some(div) => div.text().collect::<String>(),
            None => cell.text().collect::<String>().trim_matches('\n').to_string(),
        })
        .collect()
}

/// True when the fragment is a combined diff spanning several revisions.
///
/// The wiki renders such diffs with a "(N intermediate revisions not shown)"
/// row carrying the `diff-multi` class; the individual edits cannot be
/// recovered from it.
pub fn is_multi_revision(fragment: &str) -> bool {
    Html::parse_fragment(fragment)
        .select(&MULTI_MARKER)
        .next()
        .is_some()
}

/// Text of an element with `<br>` rendered as `\n`.
///
/// A newline immediately following a `<br>` in the markup is the source
/// formatting of that same break and is swallowed.
pub(crate) fn text_with_breaks(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    let mut after_break = false;

    for node in element.descendants() {
        match node.value() {
            Node::Element(el) if el.name() == "br" => {
                out.push('\n');
                after_break = true;
            }
            Node::Text(text) => {
                let mut text: &str = text;
                if after_break {
                    text = text
                        .strip_prefix("\r\n")
                        .or_else(|| text.strip_prefix('\n'))
                        .unwrap_or(text);
                }
                out.push_str(&text.replace('\r', ""));
                after_break = false;
            }
            _ => {}
        }
    }

    out
}

/// Bare `<tr>` runs are dropped by the HTML parser outside a table, so they
/// are wrapped first.
fn parse_rows(fragment: &str) -> Html {
    if fragment.contains("<table") {
        Html::parse_fragment(fragment)
    } else {
        Html::parse_fragment(&format!("<table>{fragment}</table>"))
    }
}
