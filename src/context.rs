use crate::gemini::{ContentGenerator, Part};
use crate::models::FileNode;
use crate::source::{SourceFile, DEFAULT_MIME_TYPE};
use crate::tree::build_tree;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

/// Text files above this size are never read.
pub const MAX_TEXT_FILE_SIZE: u64 = 2 * 1024 * 1024;

const TEXT_EXTENSIONS: [&str; 6] = [".md", ".json", ".js", ".ts", ".html", ".css"];

pub struct AssembledContext {
    pub tree: FileNode,
    pub listing: String,
    pub context: String,
}

/// Reads every file in sorted path order, one at a time, and concatenates the
/// directory listing with each file's content or description.
///
/// `on_progress` receives the 1-based index, the total and the file name
/// before each file is processed. A failure on one file is written into the
/// context as a marker and the loop moves on.
pub async fn assemble_context<F>(
    generator: &dyn ContentGenerator,
    files: &[Arc<dyn SourceFile>],
    mut on_progress: F,
) -> AssembledContext
where
    F: FnMut(usize, usize, &str),
{
    let start_time = Instant::now();
    let mut sorted: Vec<&Arc<dyn SourceFile>> = files.iter().collect();
    sorted.sort_by(|a, b| a.path().cmp(b.path()));

    let paths: Vec<&str> = sorted.iter().map(|f| f.path()).collect();
    let (tree, listing) = build_tree(&paths[..]);

    let mut context = String::from("## Directory Structure ##\n");
    context.push_str(&listing);
    context.push_str("\n## File Contents ##\n");

    let total = sorted.len();
    for (index, file) in sorted.into_iter().enumerate() {
        on_progress(index + 1, total, file.name());
        context.push_str(&format!("\n--- File: {} ---\n", file.path()));
        context.push_str(&file_section(generator, &**file).await);
    }

    info!(
        "Assembled context for {} files ({} chars) in {:.2?}.",
        total,
        context.len(),
        start_time.elapsed()
    );
    AssembledContext {
        tree,
        listing,
        context,
    }
}

async fn file_section(generator: &dyn ContentGenerator, file: &dyn SourceFile) -> String {
    let mime_type = if file.mime_type().is_empty() {
        DEFAULT_MIME_TYPE
    } else {
        file.mime_type()
    };

    if mime_type.starts_with("image/") {
        let description = match describe_image(generator, file, mime_type).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to summarize file '{}': {}", file.path(), e);
                summarization_failed(file.path())
            }
        };
        format!("[Image description]:\n{}\n", description)
    } else if is_text_like(mime_type, file.name()) {
        if file.size() > MAX_TEXT_FILE_SIZE {
            debug!("Skipping oversized file '{}' ({} bytes).", file.path(), file.size());
            return format!("{}\n", truncation_notice(file.size()));
        }
        match file.read_text().await {
            Ok(text) => format!("{}\n", text),
            Err(e) => {
                warn!("Failed to read file '{}': {}", file.path(), e);
                format!("{}\n", summarization_failed(file.path()))
            }
        }
    } else {
        format!("[Content of binary file type {} not shown]\n", mime_type)
    }
}

async fn describe_image(
    generator: &dyn ContentGenerator,
    file: &dyn SourceFile,
    mime_type: &str,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let data = file.read_base64().await?;
    let prompt = format!(
        "Describe this image located at \"{}\". What is its purpose in the project?",
        file.path()
    );
    let text = generator
        .generate_content(vec![Part::text(prompt), Part::image(mime_type, data)])
        .await?;
    Ok(text)
}

fn is_text_like(mime_type: &str, name: &str) -> bool {
    mime_type.starts_with("text/") || TEXT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

pub fn truncation_notice(size: u64) -> String {
    format!(
        "File too large ({:.2} MB). Content truncated.",
        size as f64 / 1024.0 / 1024.0
    )
}

pub fn summarization_failed(path: &str) -> String {
    format!("Summarization failed for this file: {}.", path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{ModelError, ModelResult};
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use parking_lot::Mutex;
    use std::io;

    /// Describes images by name; fails for any path containing "broken".
    #[derive(Default)]
    struct FakeVision {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContentGenerator for FakeVision {
        async fn generate_content(&self, parts: Vec<Part>) -> ModelResult<String> {
            let prompt = match &parts[0] {
                Part::Text { text } => text.clone(),
                Part::InlineData { .. } => String::new(),
            };
            assert!(matches!(parts.get(1), Some(Part::InlineData { .. })));
            self.prompts.lock().push(prompt.clone());
            if prompt.contains("broken") {
                return Err(ModelError::EmptyResponse);
            }
            Ok("a small logo".to_string())
        }
    }

    /// A file whose content must never be touched.
    struct Untouchable {
        path: String,
        size: u64,
    }

    #[async_trait]
    impl SourceFile for Untouchable {
        fn path(&self) -> &str {
            &self.path
        }
        fn mime_type(&self) -> &str {
            "text/plain"
        }
        fn size(&self) -> u64 {
            self.size
        }
        async fn read_text(&self) -> io::Result<String> {
            panic!("oversized file was read");
        }
        async fn read_base64(&self) -> io::Result<String> {
            panic!("oversized file was read");
        }
    }

    fn text_file(path: &str, mime: &str, content: &str) -> Arc<dyn SourceFile> {
        Arc::new(crate::source::UploadedFile {
            path: path.to_string(),
            mime_type: mime.to_string(),
            size: content.len() as u64,
            data: Some(STANDARD.encode(content)),
        })
    }

    fn image_file(path: &str) -> Arc<dyn SourceFile> {
        Arc::new(crate::source::UploadedFile {
            path: path.to_string(),
            mime_type: "image/png".to_string(),
            size: 3,
            data: Some(STANDARD.encode([1u8, 2, 3])),
        })
    }

    #[tokio::test]
    async fn sections_follow_sorted_path_order() {
        let files = vec![
            text_file("proj/z.txt", "text/plain", "zzz"),
            text_file("proj/a.txt", "text/plain", "aaa"),
            text_file("proj/m/b.txt", "text/plain", "bbb"),
        ];
        let mut seen = Vec::new();
        let assembled = assemble_context(&FakeVision::default(), &files, |i, total, name| {
            seen.push((i, total, name.to_string()))
        })
        .await;

        let a = assembled.context.find("--- File: proj/a.txt ---").unwrap();
        let b = assembled.context.find("--- File: proj/m/b.txt ---").unwrap();
        let z = assembled.context.find("--- File: proj/z.txt ---").unwrap();
        assert!(a < b && b < z);

        assert_eq!(
            seen,
            vec![
                (1, 3, "a.txt".to_string()),
                (2, 3, "b.txt".to_string()),
                (3, 3, "z.txt".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn context_layout_for_three_file_scenario() {
        let files = vec![
            image_file("dir/c.png"),
            text_file("dir/b.txt", "text/plain", "bee"),
            text_file("a.txt", "text/plain", "ay"),
        ];
        let assembled = assemble_context(&FakeVision::default(), &files, |_, _, _| {}).await;

        assert_eq!(assembled.listing, "- a.txt\n- dir\n  - b.txt\n  - c.png\n");
        assert_eq!(
            assembled.context,
            "## Directory Structure ##\n\
             - a.txt\n- dir\n  - b.txt\n  - c.png\n\
             \n## File Contents ##\n\
             \n--- File: a.txt ---\nay\n\
             \n--- File: dir/b.txt ---\nbee\n\
             \n--- File: dir/c.png ---\n[Image description]:\na small logo\n"
        );
    }

    #[tokio::test]
    async fn oversized_text_is_never_read() {
        let size = 3 * 1024 * 1024 + 512 * 1024;
        let files: Vec<Arc<dyn SourceFile>> = vec![Arc::new(Untouchable {
            path: "huge.txt".to_string(),
            size,
        })];
        let assembled = assemble_context(&FakeVision::default(), &files, |_, _, _| {}).await;
        assert!(assembled
            .context
            .contains("File too large (3.50 MB). Content truncated."));
    }

    #[tokio::test]
    async fn exactly_two_mebibytes_is_still_read() {
        let files = vec![Arc::new(crate::source::UploadedFile {
            path: "edge.txt".to_string(),
            mime_type: "text/plain".to_string(),
            size: MAX_TEXT_FILE_SIZE,
            data: Some(STANDARD.encode("edge content")),
        }) as Arc<dyn SourceFile>];
        let assembled = assemble_context(&FakeVision::default(), &files, |_, _, _| {}).await;
        assert!(assembled.context.contains("edge content"));
    }

    #[tokio::test]
    async fn failed_image_description_does_not_stop_the_batch() {
        let files = vec![
            image_file("assets/broken.png"),
            image_file("assets/logo.png"),
            text_file("notes.md", "", "# notes"),
        ];
        let vision = FakeVision::default();
        let assembled = assemble_context(&vision, &files, |_, _, _| {}).await;

        assert!(assembled.context.contains(
            "--- File: assets/broken.png ---\n[Image description]:\n\
             Summarization failed for this file: assets/broken.png.\n"
        ));
        assert!(assembled
            .context
            .contains("--- File: assets/logo.png ---\n[Image description]:\na small logo\n"));
        assert!(assembled.context.contains("--- File: notes.md ---\n# notes\n"));
        assert_eq!(vision.prompts.lock().len(), 2);
    }

    #[tokio::test]
    async fn text_detection_uses_media_type_or_extension() {
        let files = vec![
            text_file("app.ts", "video/mp2t", "let x = 1;"),
            text_file("data.json", "application/json", "{}"),
            text_file("archive.zip", "application/zip", "PK"),
            text_file("blob", "", "???"),
        ];
        let assembled = assemble_context(&FakeVision::default(), &files, |_, _, _| {}).await;

        assert!(assembled.context.contains("--- File: app.ts ---\nlet x = 1;\n"));
        assert!(assembled.context.contains("--- File: data.json ---\n{}\n"));
        assert!(assembled
            .context
            .contains("[Content of binary file type application/zip not shown]"));
        assert!(assembled
            .context
            .contains("[Content of binary file type application/octet-stream not shown]"));
        assert!(!assembled.context.contains("PK"));
    }

    #[tokio::test]
    async fn unreadable_text_file_gets_failure_marker() {
        let files = vec![Arc::new(crate::source::UploadedFile {
            path: "missing.txt".to_string(),
            mime_type: "text/plain".to_string(),
            size: 10,
            data: None,
        }) as Arc<dyn SourceFile>];
        let assembled = assemble_context(&FakeVision::default(), &files, |_, _, _| {}).await;
        assert!(assembled
            .context
            .contains("Summarization failed for this file: missing.txt."));
    }

    // Open question kept as observed: a repeated path appears once in the tree
    // but its content is still emitted for every occurrence.
    #[tokio::test]
    async fn duplicate_paths_listed_once_but_content_emitted_twice() {
        let files = vec![
            text_file("dup/file.txt", "text/plain", "first"),
            text_file("dup/file.txt", "text/plain", "second"),
        ];
        let assembled = assemble_context(&FakeVision::default(), &files, |_, _, _| {}).await;

        assert_eq!(assembled.listing, "- dup\n  - file.txt\n");
        assert_eq!(assembled.context.matches("--- File: dup/file.txt ---").count(), 2);
        assert!(assembled.context.contains("first"));
        assert!(assembled.context.contains("second"));
    }

    #[test]
    fn truncation_notice_rounds_to_two_decimals() {
        assert_eq!(
            truncation_notice(2 * 1024 * 1024 + 1),
            "File too large (2.00 MB). Content truncated."
        );
        assert_eq!(
            truncation_notice(5_000_000),
            "File too large (4.77 MB). Content truncated."
        );
    }
}
