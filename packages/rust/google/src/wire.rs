//! Docs API `batchUpdate` request encoding.
//!
//! Field names and nesting must match the Docs v1 REST schema exactly.

use serde::Serialize;

use postharvest_shared::BatchOperation;

/// Unit for embedded object dimensions.
const POINTS: &str = "PT";

/// `documents.batchUpdate` request body.
#[derive(Debug, Serialize)]
pub(crate) struct BatchUpdateBody {
    pub requests: Vec<Request>,
}

/// One entry of `requests`.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum Request {
    InsertText { location: Location, text: String },
    #[serde(rename_all = "camelCase")]
    UpdateParagraphStyle {
        range: Range,
        paragraph_style: ParagraphStyle,
        fields: &'static str,
    },
    #[serde(rename_all = "camelCase")]
    InsertInlineImage {
        location: Location,
        uri: String,
        object_size: Size,
    },
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct Location {
    pub index: usize,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Range {
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParagraphStyle {
    pub named_style_type: String,
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct Size {
    pub height: Dimension,
    pub width: Dimension,
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct Dimension {
    pub magnitude: u32,
    pub unit: &'static str,
}

/// Encode operations in order. `heading_style` is the named style applied by
/// every `ApplyHeadingStyle`.
pub(crate) fn encode(operations: &[BatchOperation], heading_style: &str) -> Vec<Request> {
    operations
        .iter()
        .map(|op| match op {
            BatchOperation::InsertText { at, text } => Request::InsertText {
                location: Location { index: *at },
                text: text.clone(),
            },
            BatchOperation::ApplyHeadingStyle { range } => Request::UpdateParagraphStyle {
                range: Range {
                    start_index: range.start,
                    end_index: range.end,
                },
                paragraph_style: ParagraphStyle {
                    named_style_type: heading_style.to_string(),
                },
                fields: "namedStyleType",
            },
            BatchOperation::InsertImage {
                at,
                asset_url,
                size,
            } => Request::InsertInlineImage {
                location: Location { index: *at },
                uri: asset_url.clone(),
                object_size: Size {
                    height: Dimension {
                        magnitude: size.height_pt,
                        unit: POINTS,
                    },
                    width: Dimension {
                        magnitude: size.width_pt,
                        unit: POINTS,
                    },
                },
            },
        })
        .collect()
}
