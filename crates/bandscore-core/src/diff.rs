//! Minimal edit scripts between an original and a corrected sentence.
//!
//! Opcodes follow the classic equal/insert/delete/replace shape: the
//! longest common subsequence of tokens anchors `Equal` runs and whatever
//! lies between two anchors becomes a single non-equal opcode.

use serde::{Deserialize, Serialize};

use crate::model::{EditKind, ErrorEdit};

/// Opcode tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpTag {
    Equal,
    Insert,
    Delete,
    Replace,
}

/// `a[a_start..a_end]` relates to `b[b_start..b_end]` as described by `tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
}

fn gap_opcode(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> Opcode {
    let tag = match (a_start == a_end, b_start == b_end) {
        (true, _) => OpTag::Insert,
        (_, true) => OpTag::Delete,
        _ => OpTag::Replace,
    };
    Opcode {
        tag,
        a_start,
        a_end,
        b_start,
        b_end,
    }
}

/// Compute LCS-based opcodes turning `a` into `b`.
pub fn opcodes<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Opcode> {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    // lcs[i * width + j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut ops: Vec<Opcode> = Vec::new();
    let (mut last_a, mut last_b) = (0usize, 0usize);
    let (mut i, mut j) = (0usize, 0usize);

    while i < n && j < m {
        if a[i] == b[j] {
            if last_a < i || last_b < j {
                ops.push(gap_opcode(last_a, i, last_b, j));
            }
            match ops.last_mut() {
                Some(op) if op.tag == OpTag::Equal && op.a_end == i && op.b_end == j => {
                    op.a_end += 1;
                    op.b_end += 1;
                }
                _ => ops.push(Opcode {
                    tag: OpTag::Equal,
                    a_start: i,
                    a_end: i + 1,
                    b_start: j,
                    b_end: j + 1,
                }),
            }
            i += 1;
            j += 1;
            last_a = i;
            last_b = j;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }

    if last_a < n || last_b < m {
        ops.push(gap_opcode(last_a, n, last_b, m));
    }

    ops
}

/// Edits and error rate for one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceDiff {
    pub edits: Vec<ErrorEdit>,
    pub error_rate: f64,
}

/// Diff a sentence against its correction, token by whitespace token.
pub fn diff_sentences(original: &str, corrected: &str) -> SentenceDiff {
    let a: Vec<&str> = original.split_whitespace().collect();
    let b: Vec<&str> = corrected.split_whitespace().collect();

    let edits: Vec<ErrorEdit> = opcodes(&a, &b)
        .into_iter()
        .filter(|op| op.tag != OpTag::Equal)
        .map(|op| {
            let original_phrase = a[op.a_start..op.a_end].join(" ");
            let corrected_phrase = b[op.b_start..op.b_end].join(" ");
            let (kind, message) = match op.tag {
                OpTag::Insert => (EditKind::Insert, format!("Insert \"{corrected_phrase}\"")),
                OpTag::Delete => (EditKind::Delete, format!("Delete \"{original_phrase}\"")),
                _ => (
                    EditKind::Replace,
                    format!("Replace \"{original_phrase}\" with \"{corrected_phrase}\""),
                ),
            };
            ErrorEdit {
                kind,
                original_phrase,
                corrected_phrase,
                message,
            }
        })
        .collect();

    let error_rate = error_rate(a.join(" ").chars().count(), &edits);
    SentenceDiff { edits, error_rate }
}

/// Mean of the per-kind normalized edit magnitudes.
///
/// `sentence_len` is the character length of the original sentence. Each
/// kind contributes the mean magnitude of its edits (0 when absent) and the
/// result is the mean of the three contributions.
pub fn error_rate(sentence_len: usize, edits: &[ErrorEdit]) -> f64 {
    if edits.is_empty() {
        return 0.0;
    }
    let len = sentence_len as f64;

    let magnitude = |edit: &ErrorEdit| -> f64 {
        let original = edit.original_phrase.chars().count() as f64;
        let corrected = edit.corrected_phrase.chars().count() as f64;
        let value = match edit.kind {
            EditKind::Insert => corrected / (len + corrected),
            EditKind::Delete => original / len,
            EditKind::Replace => (original - corrected).abs() / len,
        };
        if value.is_finite() {
            value.min(1.0)
        } else {
            1.0
        }
    };

    let contribution = |kind: EditKind| -> f64 {
        let values: Vec<f64> = edits
            .iter()
            .filter(|e| e.kind == kind)
            .map(magnitude)
            .collect();
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    (contribution(EditKind::Insert) + contribution(EditKind::Delete) + contribution(EditKind::Replace))
        / 3.0
}
