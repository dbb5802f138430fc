//! Batch assembly for the remote document.
//!
//! [`DocumentAssembler`] walks processed posts in order and emits the
//! insert/style operations for each, tracking a running cursor so every
//! position accounts for everything inserted before it in the same batch.
//!
//! Positions are counted the way the document engine counts them: UTF-16
//! code units for text, exactly one unit per embedded image.

use tracing::{debug, instrument};

use postharvest_shared::{BatchOperation, ImageSize, ProcessedPost};

/// Line break inserted after a heading and after a body.
const PARAGRAPH_BREAK: &str = "\n\n";

/// Position units taken by one embedded image.
const IMAGE_UNITS: usize = 1;

/// Length of `text` in document positions.
pub fn position_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Output of one assembly pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub operations: Vec<BatchOperation>,
    /// Cursor after the last emitted operation.
    pub final_cursor: usize,
    pub posts: usize,
}

/// Single-writer, single-pass cursor over one document.
#[derive(Debug)]
pub struct DocumentAssembler {
    cursor: usize,
    image_size: ImageSize,
    operations: Vec<BatchOperation>,
    posts: usize,
}

impl DocumentAssembler {
    /// Start writing at `end_index - 1`; the document's last position is
    /// reserved and never written past.
    pub fn new(end_index: usize, image_size: ImageSize) -> Self {
        Self {
            cursor: end_index.saturating_sub(1),
            image_size,
            operations: Vec::new(),
            posts: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Append one post's operations.
    pub fn push_post(&mut self, post: &ProcessedPost) {
        let start = self.cursor;

        // Heading, styled over its own characters only.
        let heading_start = self.cursor;
        self.insert_text(format!("{}{PARAGRAPH_BREAK}", post.heading));
        let heading_len = position_len(&post.heading);
        if heading_len > 0 {
            self.operations.push(BatchOperation::ApplyHeadingStyle {
                range: heading_start..heading_start + heading_len,
            });
        }

        for line in post.insights.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            self.insert_text(format!("{line}\n"));
        }

        // Spacer before the body.
        self.insert_text("\n".to_string());
        self.insert_text(format!("{}{PARAGRAPH_BREAK}", post.body));

        for asset_url in &post.image_refs {
            self.operations.push(BatchOperation::InsertImage {
                at: self.cursor,
                asset_url: asset_url.clone(),
                size: self.image_size,
            });
            self.cursor += IMAGE_UNITS;
            self.insert_text("\n".to_string());
        }

        for reference in &post.failed_refs {
            self.insert_text(format!("{reference}\n"));
        }

        // Separator between posts.
        self.insert_text(PARAGRAPH_BREAK.to_string());

        self.posts += 1;
        debug!(
            post = self.posts,
            from = start,
            to = self.cursor,
            images = post.image_refs.len(),
            failed = post.failed_refs.len(),
            "post assembled"
        );
    }

    pub fn finish(self) -> Assembly {
        Assembly {
            operations: self.operations,
            final_cursor: self.cursor,
            posts: self.posts,
        }
    }

    fn insert_text(&mut self, text: String) {
        let len = position_len(&text);
        self.operations.push(BatchOperation::InsertText {
            at: self.cursor,
            text,
        });
        self.cursor += len;
    }
}

/// Assemble every post in order into one batch.
#[instrument(skip_all, fields(end_index = end_index, posts = posts.len()))]
pub fn assemble(end_index: usize, posts: &[ProcessedPost], image_size: ImageSize) -> Assembly {
    let mut assembler = DocumentAssembler::new(end_index, image_size);
    for post in posts {
        assembler.push_post(post);
    }
    assembler.finish()
}
