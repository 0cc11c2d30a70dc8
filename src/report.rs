//! Markdown rendering of a finished pipeline state for the terminal.

use std::fmt::Write;

use crate::pipeline::PipelineState;

pub fn format_report(state: &PipelineState, query: &str) -> String {
    let mut output = format!("# {}\n\n", heading_text(query));

    if let Some(error) = &state.error {
        let _ = writeln!(output, "> {error}");
        return output;
    }

    if !state.sources.is_empty() {
        output.push_str("## Sources\n\n");
        for source in &state.sources {
            let url = escape_link(&source.url);
            let _ = writeln!(
                output,
                "- [{url}]({url}) ![favicon]({})",
                escape_link(&source.favicon_url)
            );
        }
        output.push('\n');
    }

    if let Some(result) = &state.result {
        output.push_str("## Summary\n\n");
        output.push_str(result);
        output.push_str("\n\n");
    }

    if !state.related_questions.is_empty() {
        output.push_str("## Related Questions\n\n");
        for question in &state.related_questions {
            let _ = writeln!(output, "- {question}");
        }
    }

    output
}

/// Backslash-escapes `[`, `]`, `(` and `)` so a URL cannot break link syntax.
fn escape_link(s: &str) -> String {
    s.chars().fold(String::with_capacity(s.len()), |mut out, c| {
        if matches!(c, '[' | ']' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
        out
    })
}

/// A query on one line, fit for a heading.
fn heading_text(query: &str) -> String {
    query.replace(['\r', '\n'], " ")
}
