use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bandscore_core::band::round_to_band;
use bandscore_core::fluency::{self, FluencyInput, FluencyParams};
use bandscore_core::grammar::{self, CorrectedSentence};
use bandscore_core::lexical::{mtld, word_tokens};
use bandscore_core::model::{
    AnnotatedSentence, DisfluencyTags, PhonemeInterval, PhonemeStatus, Word, WordAlignment,
};
use bandscore_core::pronunciation::{self, PronunciationParams};

const ANSWER: &str = "Well I grew up in a small village near the coast and we moved to the city \
    when I was twelve because my father found work there so I still go back every summer \
    and honestly I really enjoy the quiet although I miss my friends from school";

fn timed_words(text: &str) -> Vec<Word> {
    text.split_whitespace()
        .enumerate()
        .map(|(i, w)| Word::new(w, i as f64 * 0.4, i as f64 * 0.4 + 0.3, 0.9))
        .collect()
}

fn bench_round(c: &mut Criterion) {
    c.bench_function("round_to_band", |b| {
        b.iter(|| {
            (0..1000)
                .map(|i| round_to_band(black_box(i as f64 * 0.009)))
                .sum::<f64>()
        })
    });
}

fn bench_fluency(c: &mut Criterion) {
    let words = timed_words(ANSWER);
    let tags = DisfluencyTags::new();
    let sentences = vec![AnnotatedSentence::plain(ANSWER)];
    let params = FluencyParams::default();

    c.bench_function("fluency_score", |b| {
        b.iter(|| {
            let input = FluencyInput {
                transcript: ANSWER,
                words: &words,
                tags: &tags,
                sentences: &sentences,
            };
            fluency::score(black_box(&input), &params)
        })
    });
}

fn bench_grammar(c: &mut Criterion) {
    let sentences: Vec<CorrectedSentence> = [
        ("I goes to school every day.", "I go to school every day."),
        ("She have been there before.", "She has been there before."),
        ("We moved to the city when I was twelve.", "We moved to the city when I was twelve."),
    ]
    .into_iter()
    .map(|(original, corrected)| CorrectedSentence {
        sentence: AnnotatedSentence::plain(original),
        corrected: corrected.to_string(),
    })
    .collect();

    c.bench_function("grammar_score", |b| {
        b.iter(|| grammar::score(black_box(ANSWER), black_box(&sentences)))
    });
}

fn bench_mtld(c: &mut Criterion) {
    let tokens = word_tokens(&ANSWER.repeat(10));
    c.bench_function("mtld", |b| b.iter(|| mtld(black_box(&tokens))));
}

fn bench_pronunciation(c: &mut Criterion) {
    let words = timed_words(ANSWER);
    let alignment: Vec<WordAlignment> = words
        .iter()
        .map(|w| WordAlignment {
            word: w.text.clone(),
            start: w.start,
            end: w.end,
            phonemes: (0..3)
                .map(|k| PhonemeInterval {
                    arpabet: ["S", "IH1", "T"][k].to_string(),
                    ipa: String::new(),
                    start: w.start + k as f64 * 0.1,
                    end: w.start + k as f64 * 0.1 + if k == 1 { 0.04 } else { 0.1 },
                    status: PhonemeStatus::Pronounced,
                })
                .collect(),
        })
        .collect();
    let params = PronunciationParams::default();

    c.bench_function("pronunciation_score", |b| {
        b.iter(|| pronunciation::score(ANSWER, black_box(&alignment), &words, &params))
    });
}

criterion_group!(
    benches,
    bench_round,
    bench_fluency,
    bench_grammar,
    bench_mtld,
    bench_pronunciation
);
criterion_main!(benches);
