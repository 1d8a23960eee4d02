/*!
 * Placeholder markers that protect formulas and rich-text runs.
 *
 * Two marker families exist:
 * - rich-text pairs `<b0>…</b0>` used by classic MT backends,
 * - formula tokens `{{v0}}` used by chat-style LLM backends, where a
 *   protected pair is two consecutive tokens `{{v0}}…{{v1}}`.
 *
 * Backends sometimes rewrite markers slightly (`{v0}`, `{{ v0 }}`, `< b0 >`),
 * so scanning is lenient about braces and whitespace. A marker that is
 * missing, invented or reordered makes the response invalid.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::TranslationError;

static RICH_OPEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*b\s*(\d+)\s*>").expect("Invalid rich-text open regex"));

static RICH_CLOSE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*/\s*b\s*(\d+)\s*>").expect("Invalid rich-text close regex"));

static FORMULA_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{?\s*v\s*(\d+)\s*\}\}?").expect("Invalid formula placeholder regex")
});

/// Which marker family a backend expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `<bN>` / `</bN>` pairs
    #[default]
    RichTextPair,
    /// `{{vN}}` single tokens
    Formula,
}

/// Kind of marker found in a text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// `<bN>`
    Open,
    /// `</bN>`
    Close,
    /// `{{vN}}`
    Token,
}

/// One marker occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerHit {
    /// Marker kind
    pub kind: MarkerKind,
    /// Numeric id
    pub id: usize,
    /// Byte offset of the match start
    pub start: usize,
    /// Byte offset just past the match
    pub end: usize,
}

/// Markers wrapping one protected span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderPair {
    /// Id carried by the left marker
    pub left_id: usize,
    /// Id carried by the right marker
    pub right_id: usize,
    /// Left marker text
    pub left: String,
    /// Right marker text
    pub right: String,
}

/// A formula replaced by a single marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedFormula {
    /// Marker id
    pub id: usize,
    /// Marker text inserted in place of the formula
    pub marker: String,
    /// The formula itself
    pub original: String,
}

/// Text ready to send, plus what is needed to undo the protection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedText {
    /// Text with markers inserted
    pub text: String,
    /// Formulas replaced by markers
    pub formulas: Vec<ProtectedFormula>,
    /// Rich-text runs wrapped by marker pairs
    pub pairs: Vec<PlaceholderPair>,
}

/// Generates, scans and verifies placeholder markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaceholderCodec {
    style: PlaceholderStyle,
}

impl PlaceholderCodec {
    /// Create a codec for the given marker family
    pub fn new(style: PlaceholderStyle) -> Self {
        Self { style }
    }

    /// The marker family
    pub fn style(&self) -> PlaceholderStyle {
        self.style
    }

    /// Ids consumed by one pair
    fn ids_per_pair(&self) -> usize {
        match self.style {
            PlaceholderStyle::RichTextPair => 1,
            PlaceholderStyle::Formula => 2,
        }
    }

    /// Marker pair for a rich-text run
    pub fn wrap(&self, id: usize) -> PlaceholderPair {
        match self.style {
            PlaceholderStyle::RichTextPair => PlaceholderPair {
                left_id: id,
                right_id: id,
                left: format!("<b{}>", id),
                right: format!("</b{}>", id),
            },
            PlaceholderStyle::Formula => PlaceholderPair {
                left_id: id,
                right_id: id + 1,
                left: self.wrap_formula(id),
                right: self.wrap_formula(id + 1),
            },
        }
    }

    /// Single marker standing in for a formula
    pub fn wrap_formula(&self, id: usize) -> String {
        match self.style {
            PlaceholderStyle::RichTextPair => format!("<b{}></b{}>", id, id),
            PlaceholderStyle::Formula => format!("{{{{v{}}}}}", id),
        }
    }

    /// Start building a protected text
    pub fn builder(&self) -> ProtectedTextBuilder {
        ProtectedTextBuilder {
            codec: *self,
            text: String::new(),
            next_id: 0,
            formulas: Vec::new(),
            pairs: Vec::new(),
        }
    }

    /// Find every marker of this codec's family, in text order
    pub fn scan(&self, text: &str) -> Vec<MarkerHit> {
        let mut hits: Vec<MarkerHit> = match self.style {
            PlaceholderStyle::RichTextPair => {
                let opens = collect_hits(&RICH_OPEN_REGEX, text, MarkerKind::Open);
                let closes = collect_hits(&RICH_CLOSE_REGEX, text, MarkerKind::Close);
                opens.into_iter().chain(closes).collect()
            }
            PlaceholderStyle::Formula => collect_hits(&FORMULA_REGEX, text, MarkerKind::Token),
        };
        hits.sort_by_key(|h| h.start);
        hits
    }

    /// Check that `output` carries exactly the markers of `source`.
    ///
    /// Every marker in the source must appear in the output as many times as
    /// in the source, no marker may appear that the source does not have, and
    /// every rich-text pair that alternates open-close in the source must
    /// alternate the same way in the output.
    pub fn verify(&self, source: &str, output: &str) -> Result<(), String> {
        let source_hits = self.scan(source);
        let expected = count_markers(&source_hits);
        let found_hits = self.scan(output);
        let found = count_markers(&found_hits);

        let mut missing: Vec<String> = Vec::new();
        let mut duplicated: Vec<String> = Vec::new();
        for ((kind, id), count) in &expected {
            let present = found.get(&(*kind, *id)).copied().unwrap_or(0);
            if present < *count {
                missing.push(describe(*kind, *id));
            } else if present > *count {
                duplicated.push(describe(*kind, *id));
            }
        }
        if !missing.is_empty() {
            missing.sort();
            return Err(format!("missing placeholder markers: {}", missing.join(", ")));
        }
        if !duplicated.is_empty() {
            duplicated.sort();
            return Err(format!("duplicated placeholder markers: {}", duplicated.join(", ")));
        }

        let mut unexpected: Vec<String> = found
            .keys()
            .filter(|key| !expected.contains_key(key))
            .map(|(kind, id)| describe(*kind, *id))
            .collect();
        if !unexpected.is_empty() {
            unexpected.sort();
            return Err(format!("unexpected placeholder markers: {}", unexpected.join(", ")));
        }

        if self.style == PlaceholderStyle::RichTextPair {
            let mut ids: Vec<usize> = source_hits
                .iter()
                .filter(|h| h.kind == MarkerKind::Open)
                .map(|h| h.id)
                .collect();
            ids.dedup();
            for id in ids {
                if alternates(&source_hits, id) && !alternates(&found_hits, id) {
                    return Err(format!("placeholder pair {} is reordered", id));
                }
            }
        }

        Ok(())
    }

    /// Check that each pair is present and ordered left-before-right
    pub fn verify_pairs(&self, output: &str, pairs: &[PlaceholderPair]) -> Result<(), String> {
        self.locate_pairs(output, pairs).map(|_| ())
    }

    /// Text enclosed by each pair, in pair order
    pub fn extract_spans(
        &self,
        output: &str,
        pairs: &[PlaceholderPair],
    ) -> Result<Vec<String>, TranslationError> {
        let located = self
            .locate_pairs(output, pairs)
            .map_err(TranslationError::Integrity)?;
        Ok(located
            .into_iter()
            .map(|(left_end, right_start)| output[left_end..right_start].to_string())
            .collect())
    }

    /// Undo protection: put formulas back and drop pair markers
    pub fn restore(&self, output: &str, protected: &ProtectedText) -> Result<String, TranslationError> {
        self.verify_pairs(output, &protected.pairs)
            .map_err(TranslationError::Integrity)?;

        let formulas: HashMap<usize, &str> = protected
            .formulas
            .iter()
            .map(|f| (f.id, f.original.as_str()))
            .collect();
        let pair_ids: Vec<usize> = protected
            .pairs
            .iter()
            .flat_map(|p| [p.left_id, p.right_id])
            .collect();

        let hits = self.scan(output);
        for formula in &protected.formulas {
            let present = hits.iter().any(|h| {
                h.id == formula.id && matches!(h.kind, MarkerKind::Token | MarkerKind::Open)
            });
            if !present {
                return Err(TranslationError::Integrity(format!(
                    "formula placeholder {} is missing",
                    formula.marker
                )));
            }
        }

        let mut restored = String::with_capacity(output.len());
        let mut cursor = 0;
        let mut index = 0;
        while index < hits.len() {
            let hit = &hits[index];
            restored.push_str(&output[cursor..hit.start]);
            cursor = hit.end;

            match (self.style, hit.kind) {
                (PlaceholderStyle::RichTextPair, MarkerKind::Open) if formulas.contains_key(&hit.id) => {
                    restored.push_str(formulas[&hit.id]);
                    // `<bN></bN>` stands for one formula; swallow the closing half
                    if let Some(next) = hits.get(index + 1) {
                        if next.kind == MarkerKind::Close && next.id == hit.id {
                            cursor = next.end;
                            index += 1;
                        }
                    }
                }
                (PlaceholderStyle::RichTextPair, MarkerKind::Close) if formulas.contains_key(&hit.id) => {}
                (PlaceholderStyle::Formula, MarkerKind::Token) if formulas.contains_key(&hit.id) => {
                    restored.push_str(formulas[&hit.id]);
                }
                (_, _) if pair_ids.contains(&hit.id) => {}
                // Markers the protection did not create are left as they are
                (_, _) => restored.push_str(&output[hit.start..hit.end]),
            }
            index += 1;
        }
        restored.push_str(&output[cursor..]);

        Ok(restored)
    }

    fn locate_pairs(
        &self,
        output: &str,
        pairs: &[PlaceholderPair],
    ) -> Result<Vec<(usize, usize)>, String> {
        let hits = self.scan(output);
        let (left_kind, right_kind) = match self.style {
            PlaceholderStyle::RichTextPair => (MarkerKind::Open, MarkerKind::Close),
            PlaceholderStyle::Formula => (MarkerKind::Token, MarkerKind::Token),
        };

        pairs
            .iter()
            .map(|pair| {
                let left = single_hit(&hits, left_kind, pair.left_id, &pair.left)?;
                let right = single_hit(&hits, right_kind, pair.right_id, &pair.right)?;
                if right.start < left.end {
                    return Err(format!(
                        "markers {} and {} are reordered",
                        pair.left, pair.right
                    ));
                }
                Ok((left.end, right.start))
            })
            .collect()
    }
}

/// Incrementally assembles a `ProtectedText`
#[derive(Debug, Clone)]
pub struct ProtectedTextBuilder {
    codec: PlaceholderCodec,
    text: String,
    next_id: usize,
    formulas: Vec<ProtectedFormula>,
    pairs: Vec<PlaceholderPair>,
}

impl ProtectedTextBuilder {
    /// Append translatable text
    pub fn push_text(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    /// Replace a formula with a marker; returns the marker id
    pub fn push_formula(&mut self, original: &str) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        let marker = self.codec.wrap_formula(id);
        self.text.push_str(&marker);
        self.formulas.push(ProtectedFormula {
            id,
            marker,
            original: original.to_string(),
        });
        id
    }

    /// Wrap a rich-text run in a marker pair
    pub fn push_span(&mut self, inner: &str) -> PlaceholderPair {
        let pair = self.codec.wrap(self.next_id);
        self.next_id += self.codec.ids_per_pair();
        self.text.push_str(&pair.left);
        self.text.push_str(inner);
        self.text.push_str(&pair.right);
        self.pairs.push(pair.clone());
        pair
    }

    /// Finish building
    pub fn build(self) -> ProtectedText {
        ProtectedText {
            text: self.text,
            formulas: self.formulas,
            pairs: self.pairs,
        }
    }
}

fn collect_hits(regex: &Regex, text: &str, kind: MarkerKind) -> Vec<MarkerHit> {
    regex
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let id = cap.get(1)?.as_str().parse().ok()?;
            Some(MarkerHit {
                kind,
                id,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

fn count_markers(hits: &[MarkerHit]) -> HashMap<(MarkerKind, usize), usize> {
    let mut counts = HashMap::new();
    for hit in hits {
        *counts.entry((hit.kind, hit.id)).or_insert(0) += 1;
    }
    counts
}

/// The one occurrence of a pair marker
fn single_hit<'a>(
    hits: &'a [MarkerHit],
    kind: MarkerKind,
    id: usize,
    marker: &str,
) -> Result<&'a MarkerHit, String> {
    let mut matching = hits.iter().filter(|h| h.kind == kind && h.id == id);
    match (matching.next(), matching.next()) {
        (Some(hit), None) => Ok(hit),
        (None, _) => Err(format!("marker {} is missing", marker)),
        (Some(_), Some(_)) => Err(format!("marker {} is duplicated", marker)),
    }
}

/// Whether the `<bN>`/`</bN>` markers with `id` run open, close, open, close
fn alternates(hits: &[MarkerHit], id: usize) -> bool {
    hits.iter()
        .filter(|h| h.id == id && matches!(h.kind, MarkerKind::Open | MarkerKind::Close))
        .enumerate()
        .all(|(i, h)| {
            let expected = if i % 2 == 0 { MarkerKind::Open } else { MarkerKind::Close };
            h.kind == expected
        })
}

fn describe(kind: MarkerKind, id: usize) -> String {
    match kind {
        MarkerKind::Open => format!("<b{}>", id),
        MarkerKind::Close => format!("</b{}>", id),
        MarkerKind::Token => format!("{{{{v{}}}}}", id),
    }
}
