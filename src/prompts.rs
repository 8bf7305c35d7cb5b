//! User-message bodies sent to the semantic oracle.
//!
//! The system side of each conversation lives in the awful_aj chat template;
//! these functions only render the per-call payload.

/// Ask whether two headlines report the same concrete event.
pub fn same_event(title_a: &str, title_b: &str) -> String {
    format!(
        r#"Do these two headlines describe the same concrete event? Answer YES or NO only.

HEADLINE A: {title_a}
HEADLINE B: {title_b}"#
    )
}

/// Ask for the primary organization and an English headline for each title.
///
/// Ids are the zero-based positions of the titles in this batch.
pub fn entity_batch(titles: &[String]) -> String {
    let items = titles
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{i}. {}", t.replace('\n', " ").trim()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"For each numbered tech headline below, name the single company or organization the story is mainly about, and translate the headline into concise English.

HEADLINES:
{items}

RULES:
1. Use the organization's common short name (e.g. "Apple", "TSMC", "Samsung").
2. If no single organization is clearly central, use "None".
3. Keep the ids exactly as numbered above.

Return ONLY a JSON array, no markdown:
[
  {{"id": 0, "company": "Apple", "title": "Apple unveils new chip"}},
  {{"id": 1, "company": "None", "title": "Typhoon disrupts flights in Taiwan"}}
]"#
    )
}
