use crate::error::AppError;
use crate::gemini::ContentGenerator;
use log::{error, info};
use std::time::Instant;

const DEFAULT_SUBJECT: &str = "ai-analysis";

pub async fn generate_report(
    generator: &dyn ContentGenerator,
    master_prompt: &str,
    context: &str,
) -> Result<String, AppError> {
    let final_prompt = format!(
        "\n{}\n\n\
         This is the context of the uploaded project. It includes the directory structure, \
         the full contents of every text file, and descriptions of every image file.\n\n\
         {}\n\n\
         Please now generate the report in Markdown format based on these files and your instructions.\n",
        master_prompt, context
    );

    let start_time = Instant::now();
    let response = generator.generate_text(&final_prompt).await.map_err(|e| {
        error!("Error generating final report: {}", e);
        AppError::ReportGeneration
    })?;
    info!(
        "Report generated ({} chars) in {:.2?}.",
        response.len(),
        start_time.elapsed()
    );
    Ok(strip_code_fence(&response))
}

/// Removes a wrapping Markdown code fence, with or without a language tag.
pub fn strip_code_fence(text: &str) -> String {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        // A language tag is a single word ending the fence line.
        body = match rest.split_once('\n') {
            Some((tag, after)) if !tag.trim().contains(char::is_whitespace) => after,
            _ => rest,
        };
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim().to_string()
}

/// Asks the model for a Word-friendly HTML rendering of `markdown`.
/// The answer is trimmed but otherwise returned as-is.
pub async fn convert_markdown_to_html(
    generator: &dyn ContentGenerator,
    markdown: &str,
) -> Result<String, AppError> {
    let prompt = format!(
        "\nConvert the following Markdown text into a standalone HTML document.\n\
         Use inline styles to ensure good compatibility with Microsoft Word.\n\
         The HTML should be well structured, but must not contain any <script> tags or external stylesheet links.\n\
         Output the HTML code directly, without any explanation or markdown code block wrapping.\n\n\
         The Markdown content is as follows:\n---\n{}\n",
        markdown
    );

    let html = generator.generate_text(&prompt).await.map_err(|e| {
        error!("Error converting Markdown to HTML: {}", e);
        AppError::FormatConversion
    })?;
    Ok(html.trim().to_string())
}

pub fn build_word_document(html: &str) -> String {
    format!(
        "<html xmlns:w=\"urn:schemas-microsoft-com:office:word\" xmlns=\"http://www.w3.org/TR/REC-html40\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>AI Analysis Report</title>\n\
         </head>\n\
         <body>\n\
         {}\n\
         </body>\n\
         </html>\n",
        html
    )
}

/// `<subject>-report.doc`, where the subject is the uploaded folder's name.
pub fn report_file_name(subject: Option<&str>) -> String {
    let subject: String = subject
        .unwrap_or(DEFAULT_SUBJECT)
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let subject = subject.trim_matches(|c: char| c == '-' || c == '.');
    let subject = if subject.is_empty() {
        DEFAULT_SUBJECT
    } else {
        subject
    };
    format!("{}-report.doc", subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{ModelError, ModelResult, Part};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Scripted {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn replying(reply: &str) -> Self {
            Scripted {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Scripted {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ContentGenerator for Scripted {
        async fn generate_content(&self, parts: Vec<Part>) -> ModelResult<String> {
            for part in parts {
                if let Part::Text { text } = part {
                    self.prompts.lock().push(text);
                }
            }
            self.reply.clone().ok_or(ModelError::EmptyResponse)
        }
    }

    #[tokio::test]
    async fn report_is_unwrapped_from_markdown_fence() {
        let model = Scripted::replying("```markdown\n# Overview\n\nAll good.\n```\n");
        let report = generate_report(&model, "Summarize.", "## Directory Structure ##\n")
            .await
            .unwrap();
        assert_eq!(report, "# Overview\n\nAll good.");
        assert!(!report.contains("```"));
    }

    #[tokio::test]
    async fn prompt_contains_template_and_context_in_order() {
        let model = Scripted::replying("ok");
        generate_report(&model, "TEMPLATE-T", "CONTEXT-C").await.unwrap();

        let prompts = model.prompts.lock();
        let prompt = &prompts[0];
        let t = prompt.find("TEMPLATE-T").unwrap();
        let c = prompt.find("CONTEXT-C").unwrap();
        assert!(t < c);
        assert!(prompt.contains("Markdown format"));
    }

    #[tokio::test]
    async fn report_failure_is_normalized() {
        let err = generate_report(&Scripted::failing(), "t", "c").await.unwrap_err();
        assert!(matches!(err, AppError::ReportGeneration));
    }

    #[test]
    fn fence_variants_are_stripped() {
        assert_eq!(strip_code_fence("```\nplain\n```"), "plain");
        assert_eq!(strip_code_fence("```md\n# T\n```"), "# T");
        assert_eq!(strip_code_fence("  # Untouched  "), "# Untouched");
        assert_eq!(strip_code_fence("```markdown\n# Open only"), "# Open only");
        assert_eq!(strip_code_fence("text with ``` inside"), "text with ``` inside");
        assert_eq!(strip_code_fence("```Summary: ok```"), "Summary: ok");
        assert_eq!(strip_code_fence("```Summary: ok\nmore\n```"), "Summary: ok\nmore");
    }

    // Conversion output is trimmed only; unlike reports, fences are left in place.
    #[tokio::test]
    async fn conversion_keeps_code_fences_verbatim() {
        let model = Scripted::replying("  ```html\n<h1>Hi</h1>\n```  ");
        let html = convert_markdown_to_html(&model, "# Hi").await.unwrap();
        assert_eq!(html, "```html\n<h1>Hi</h1>\n```");
        assert!(model.prompts.lock()[0].contains("# Hi"));
    }

    #[tokio::test]
    async fn conversion_failure_is_normalized() {
        let err = convert_markdown_to_html(&Scripted::failing(), "# Hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FormatConversion));
    }

    #[test]
    fn word_document_wraps_fragment() {
        let doc = build_word_document("<p style=\"color:red\">x</p>");
        assert!(doc.starts_with("<html xmlns:w=\"urn:schemas-microsoft-com:office:word\""));
        assert!(doc.contains("<meta charset=\"utf-8\">"));
        assert!(doc.contains("<body>\n<p style=\"color:red\">x</p>\n</body>"));
    }

    #[test]
    fn report_file_names() {
        assert_eq!(report_file_name(None), "ai-analysis-report.doc");
        assert_eq!(report_file_name(Some("my project")), "my-project-report.doc");
        assert_eq!(report_file_name(Some("..")), "ai-analysis-report.doc");
    }
}
