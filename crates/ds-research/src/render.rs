//! Text renderings of search results, curated sources and session traces.

use std::fmt::Write;

use ds_core::{Page, SearchResult};

use crate::session::ResearchSession;

const FAILED_SEARCH_NOTICE: &str = "Web search failed, try another query.";
const EMPTY_SEARCH_NOTICE: &str = "The search returned no pages, try another query.";
const NO_SOURCES_NOTICE: &str = "No sources available.";
const TRACE_PREVIEW_CHARS: usize = 2000;

/// Render one search result for the planner.
///
/// With `include_content` the page text is appended under each header.
/// Without it, the token count and any evaluation scores take its place.
pub fn render_pages(result: &SearchResult, include_content: bool) -> String {
    if !result.success {
        return FAILED_SEARCH_NOTICE.to_string();
    }
    if result.pages.is_empty() {
        return EMPTY_SEARCH_NOTICE.to_string();
    }

    result
        .pages
        .iter()
        .enumerate()
        .map(|(i, page)| render_page(i + 1, page, include_content))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

fn render_page(index: usize, page: &Page, include_content: bool) -> String {
    let mut out = format!(
        "[{i}] Title: {}\n[{i}] URL Source: {}\n[{i}] Description: {}\n",
        page.title,
        page.url,
        page.description,
        i = index
    );

    if include_content {
        out.push('\n');
        out.push_str(&page.content);
        return out;
    }

    let _ = writeln!(out, "[{}] Content tokens: {}", index, page.content_token_count);
    if let Some(eval) = &page.evaluation {
        let _ = writeln!(
            out,
            "[{i}] Depth: {}/5 - {}\n[{i}] Relevance: {}/5 - {}",
            eval.depth_score,
            eval.depth_summary,
            eval.relevance_score,
            eval.relevance_summary,
            i = index
        );
    }
    out
}

/// Render curated sources for the report prompt. Page `i` is cited as `[i]`.
pub fn render_sources(pages: &[Page]) -> String {
    if pages.is_empty() {
        return NO_SOURCES_NOTICE.to_string();
    }

    pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            format!(
                "[{i}] Title: {}\n[{i}] URL: {}\n\n{}",
                page.title,
                page.url,
                page.content,
                i = i + 1
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Markdown dump of every search in the session.
pub fn render_search_trace(session: &ResearchSession) -> String {
    let mut out = format!("# Search trace\n\n**Research task:** {}\n\n", session.user_query());
    let _ = writeln!(
        out,
        "**Iterations:** {}  \n**Search tokens:** {}\n",
        session.iteration_count(),
        session.accumulated_token_count()
    );

    for (i, result) in session.search_results().iter().enumerate() {
        let _ = writeln!(out, "## Iteration {}: {}\n", i + 1, result.query);
        let _ = writeln!(
            out,
            "- Success: {}\n- Pages: {}\n- Token cost: {}\n",
            result.success,
            result.pages.len(),
            result.provider_token_cost
        );

        for (j, page) in result.pages.iter().enumerate() {
            let _ = writeln!(out, "### [{}] {}\n", j + 1, page.title);
            let _ = writeln!(out, "- URL: {}", page.url);
            let _ = writeln!(out, "- Content tokens: {}", page.content_token_count);
            if let Some(eval) = &page.evaluation {
                let _ = writeln!(
                    out,
                    "- Depth: {}/5, relevance: {}/5",
                    eval.depth_score, eval.relevance_score
                );
            }
            let _ = writeln!(out, "\n```\n{}\n```\n", preview(&page.content));
        }
    }
    out
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(TRACE_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::PageEvaluation;

    fn result() -> SearchResult {
        let mut first = Page::new("https://a.example", "Alpha", "first page", "alpha body");
        first.content_token_count = 10;
        first.evaluation = Some(PageEvaluation {
            depth_summary: "detailed".into(),
            depth_score: 4,
            relevance_summary: "on topic".into(),
            relevance_score: 5,
        });
        let second = Page::new("https://b.example", "Beta", "second page", "beta body");
        SearchResult::succeeded("q", vec![first, second], 100)
    }

    #[test]
    fn test_content_bearing_rendering() {
        let text = render_pages(&result(), true);
        assert!(text.starts_with("[1] Title: Alpha\n[1] URL Source: https://a.example\n"));
        assert!(text.contains("\n\nalpha body"));
        assert!(text.contains("\n---\n[2] Title: Beta"));
        assert!(text.contains("beta body"));
    }

    #[test]
    fn test_content_free_rendering_omits_text() {
        let text = render_pages(&result(), false);
        assert!(!text.contains("alpha body"));
        assert!(!text.contains("beta body"));
        assert!(text.contains("[1] Content tokens: 10"));
        assert!(text.contains("[1] Depth: 4/5 - detailed"));
        assert!(text.contains("[1] Relevance: 5/5 - on topic"));
        assert!(!text.contains("[2] Depth"));
    }

    #[test]
    fn test_failed_and_empty_notices() {
        assert_eq!(render_pages(&SearchResult::failed("q"), true), FAILED_SEARCH_NOTICE);
        let empty = SearchResult::succeeded("q", vec![], 0);
        assert_eq!(render_pages(&empty, false), EMPTY_SEARCH_NOTICE);
    }

    #[test]
    fn test_render_sources() {
        assert_eq!(render_sources(&[]), "No sources available.");
        let text = render_sources(&result().pages);
        assert!(text.starts_with("[1] Title: Alpha\n[1] URL: https://a.example\n\nalpha body"));
        assert!(text.contains("[2] URL: https://b.example"));
    }

    #[test]
    fn test_trace_caps_previews() {
        let mut session = ResearchSession::new("task");
        let long = "x".repeat(TRACE_PREVIEW_CHARS + 50);
        session.record_search(SearchResult::succeeded(
            "task",
            vec![Page::new("https://a", "A", "", long)],
            7,
        ));
        session.record_search(SearchResult::failed("second"));

        let trace = render_search_trace(&session);
        assert!(trace.contains("## Iteration 1: task"));
        assert!(trace.contains("## Iteration 2: second"));
        assert!(trace.contains("- Success: false"));
        assert!(trace.contains(&format!("{}...", "x".repeat(TRACE_PREVIEW_CHARS))));
        assert!(!trace.contains(&"x".repeat(TRACE_PREVIEW_CHARS + 1)));
    }
}
