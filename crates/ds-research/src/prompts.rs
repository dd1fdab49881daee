//! Prompt templates for the research loop.
//!
//! Templates are rendered with minijinja. Each render builds a throwaway
//! environment so no template state outlives a call.

use minijinja::Environment;
use serde::Serialize;

use crate::error::ResearchError;

pub const SYSTEM_PROMPT: &str = r#"You are a meticulous research assistant. You investigate a topic by running web searches one at a time, reading what comes back, and deciding what to search for next.

After each search you will see the pages that were returned. Judge how well they cover the research task, note what is still missing, and propose exactly one new search query that fills the most important gap.

Guidelines:
- Prefer specific queries over broad ones
- Do not repeat a query that has already been executed
- Look for primary sources, data, and expert analysis
- Cover different angles of the task across iterations"#;

pub const TASK_TEMPLATE: &str = r#"Research task:

{{ user_query }}

A first search for the task itself is running now. You will see its results next."#;

pub const RESULTS_TEMPLATE: &str = r#"Search results:

{{ search_result }}

Queries executed so far:
{% for query in executed_queries %}- {{ query }}
{% else %}(none)
{% endfor %}
Evaluate these results against the research task and choose the next search query."#;

pub const REPORT_SYSTEM_PROMPT: &str = r#"You are an expert research writer. Write a thorough, well-structured report that answers the research task using only the numbered sources provided.

Rules:
- Cite sources inline with their number in brackets, e.g. [1] or [2][5]
- Do not invent sources or cite numbers that were not provided
- Use Markdown headings and paragraphs
- If no sources are available, say so plainly and answer only as far as general knowledge allows"#;

pub const REPORT_TEMPLATE: &str = r#"Research task:

{{ user_query }}

Sources:

{{ sources }}

Write the report now."#;

pub const EVAL_SYSTEM_PROMPT: &str = r#"You assess web pages for a research assistant. For the page you are given, judge two things:

Depth (1-5): how substantive the content is. 1 is a thin listing or advertisement, 5 is detailed expert analysis with evidence.
Relevance (1-5): how directly the page addresses the search query. 1 is off-topic, 5 answers it fully.

Give a one or two sentence summary for each judgement."#;

pub const EVAL_TEMPLATE: &str = r#"Search query: {{ search_query }}

Page:

{{ page_content }}"#;

/// Render `template` with `ctx`, naming the template in any error.
pub fn render<S: Serialize>(name: &str, template: &str, ctx: S) -> Result<String, ResearchError> {
    Environment::new()
        .render_str(template, ctx)
        .map_err(|e| ResearchError::Template {
            name: name.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_render_task() {
        let text = render("task", TASK_TEMPLATE, context! { user_query => "history of Rust" }).unwrap();
        assert!(text.contains("history of Rust"));
    }

    #[test]
    fn test_render_results_lists_queries() {
        let text = render(
            "results",
            RESULTS_TEMPLATE,
            context! {
                search_result => "PAGES",
                executed_queries => vec!["a", "b"],
            },
        )
        .unwrap();
        assert!(text.contains("PAGES"));
        assert!(text.contains("- a\n"));
        assert!(text.contains("- b\n"));
        assert!(!text.contains("(none)"));

        let empty: Vec<String> = Vec::new();
        let text = render(
            "results",
            RESULTS_TEMPLATE,
            context! { search_result => "", executed_queries => empty },
        )
        .unwrap();
        assert!(text.contains("(none)"));
    }

    #[test]
    fn test_render_error_names_template() {
        let err = render("broken", "{% if %}", context! {}).unwrap_err();
        assert!(matches!(err, ResearchError::Template { ref name, .. } if name == "broken"));
    }
}
