//! Rule-based sentence classification over dependency parses.
//!
//! Tokens carry Universal POS (`pos`), Penn Treebank tags (`tag`) and
//! dependency labels (`dep`) with a head index. Both ClearNLP-style labels
//! (`nsubjpass`, `auxpass`) and UD v2 labels (`nsubj:pass`, `aux:pass`)
//! are recognized.

use crate::model::{
    AnnotatedSentence, Aspect, GrammarFeature, SentenceAnnotation, SentenceFunction,
    SentenceStructure, Tense, TimeFrame, Token,
};

const SUBORDINATE_DEPS: &[&str] = &[
    "advcl", "ccomp", "xcomp", "acl", "relcl", "acl:relcl", "csubj", "csubjpass", "csubj:pass",
    "mark",
];

const PASSIVE_DEPS: &[&str] = &["nsubjpass", "auxpass", "nsubj:pass", "aux:pass"];

const AUX_DEPS: &[&str] = &["aux", "auxpass", "aux:pass"];

pub const CONDITIONAL_TRIGGERS: &[&str] = &[
    "if", "unless", "provided", "providing", "whether", "otherwise", "suppose", "supposing",
];

const MODALS: &[&str] = &[
    "can", "could", "may", "might", "must", "shall", "should", "will", "would", "ought", "'ll",
    "'d", "ca", "wo",
];

const SUBORDINATORS: &[&str] = &[
    "because", "although", "though", "while", "whereas", "since", "unless", "if", "when",
    "whenever", "before", "after", "until", "which", "who", "whom", "whose", "that", "where",
];

const COORDINATORS: &[&str] = &["and", "but", "or", "so", "yet", "nor"];

const WH_WORDS: &[&str] = &["what", "why", "how", "where", "when", "who", "whom", "which", "whose"];

const FUTURE_AUX: &[&str] = &["will", "shall", "'ll", "wo"];
const HAVE_FORMS: &[&str] = &["have", "has", "had", "'ve", "having"];
const BE_FORMS: &[&str] = &[
    "be", "am", "is", "are", "was", "were", "been", "being", "'m", "'s", "'re",
];
const PAST_FORMS: &[&str] = &["was", "were", "had", "did"];

fn has_parse(tokens: &[Token]) -> bool {
    tokens.iter().any(|t| !t.dep.is_empty())
}

fn is_verbal(token: &Token) -> bool {
    matches!(token.pos.as_str(), "VERB" | "AUX") || token.tag.starts_with("VB")
}

fn bare(token: &Token) -> String {
    token
        .lower()
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .to_string()
}

/// Simple, compound, complex, or compound-complex.
pub fn classify_structure(tokens: &[Token]) -> SentenceStructure {
    let (subordinate, coordinate) = if has_parse(tokens) {
        let subordinate = tokens
            .iter()
            .filter(|t| SUBORDINATE_DEPS.contains(&t.dep.as_str()))
            .count();
        let coordinate = tokens
            .iter()
            .filter(|t| t.dep == "cc")
            .filter(|t| tokens.get(t.head).is_some_and(is_verbal))
            .count();
        (subordinate, coordinate)
    } else {
        let words: Vec<String> = tokens.iter().map(bare).collect();
        let subordinate = words
            .iter()
            .filter(|w| SUBORDINATORS.contains(&w.as_str()))
            .count();
        // Without a parse a coordinator only counts between two clauses,
        // so ignore one in first position.
        let coordinate = words
            .iter()
            .skip(1)
            .filter(|w| COORDINATORS.contains(&w.as_str()))
            .count();
        (subordinate, coordinate)
    };

    match (subordinate > 0, coordinate > 0) {
        (false, false) => SentenceStructure::Simple,
        (false, true) => SentenceStructure::Compound,
        (true, false) => SentenceStructure::Complex,
        (true, true) => SentenceStructure::CompoundComplex,
    }
}

/// Distinct grammatical features used, in declaration order.
pub fn detect_features(tokens: &[Token]) -> Vec<GrammarFeature> {
    let modal = tokens.iter().any(|t| {
        t.tag == "MD" || (t.tag.is_empty() && MODALS.contains(&bare(t).as_str()))
    });
    let passive = tokens
        .iter()
        .any(|t| PASSIVE_DEPS.contains(&t.dep.as_str()));
    let conditional = tokens
        .iter()
        .any(|t| CONDITIONAL_TRIGGERS.contains(&bare(t).as_str()));
    let relative = tokens.iter().any(|t| {
        matches!(t.dep.as_str(), "relcl" | "acl:relcl")
            || (matches!(t.tag.as_str(), "WDT" | "WP" | "WP$")
                && tokens
                    .get(t.head)
                    .is_some_and(|h| matches!(h.dep.as_str(), "relcl" | "acl:relcl")))
    });

    GrammarFeature::ALL
        .into_iter()
        .zip([modal, passive, conditional, relative])
        .filter_map(|(feature, used)| used.then_some(feature))
        .collect()
}

/// Heads of verb groups: main verbs, plus auxiliaries that act as the
/// predicate themselves (copulas, elliptical "I do").
fn verb_group_heads(tokens: &[Token]) -> Vec<usize> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| match t.pos.as_str() {
            "VERB" => true,
            "AUX" => !AUX_DEPS.contains(&t.dep.as_str()),
            _ => false,
        })
        .map(|(i, _)| i)
        .collect()
}

fn tense_of_group(tokens: &[Token], head: usize) -> Option<Tense> {
    let main = &tokens[head];
    let auxes: Vec<&Token> = tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| *i != head && t.head == head && AUX_DEPS.contains(&t.dep.as_str()))
        .filter(|(_, t)| t.tag != "TO")
        .map(|(_, t)| t)
        .collect();

    let aux_words: Vec<String> = auxes.iter().map(|t| bare(t)).collect();
    let has = |list: &[&str]| aux_words.iter().any(|w| list.contains(&w.as_str()));

    if aux_words.is_empty() && !matches!(main.tag.as_str(), "VBD" | "VBZ" | "VBP") {
        // Infinitives, participles, and imperatives are not finite groups.
        return None;
    }

    let future = has(FUTURE_AUX);
    let perfect = has(HAVE_FORMS) || (aux_words.iter().any(|w| w == "'d") && main.tag == "VBN");
    let continuous = main.tag == "VBG" && has(BE_FORMS);

    let aspect = match (perfect, continuous) {
        (true, true) => Aspect::PerfectContinuous,
        (true, false) => Aspect::Perfect,
        (false, true) => Aspect::Continuous,
        (false, false) => Aspect::Simple,
    };

    let time = if future {
        TimeFrame::Future
    } else {
        let first_finite = auxes.first().copied().unwrap_or(main);
        let word = bare(first_finite);
        if first_finite.tag == "VBD" || PAST_FORMS.contains(&word.as_str()) {
            TimeFrame::Past
        } else {
            TimeFrame::Present
        }
    };

    Some(Tense::new(time, aspect))
}

/// Distinct tenses of the finite verb groups, in order of appearance.
pub fn detect_tenses(tokens: &[Token]) -> Vec<Tense> {
    let mut tenses = Vec::new();
    for head in verb_group_heads(tokens) {
        if let Some(tense) = tense_of_group(tokens, head) {
            if !tenses.contains(&tense) {
                tenses.push(tense);
            }
        }
    }
    tenses
}

/// Declarative, interrogative, imperative, or exclamatory.
pub fn classify_function(sentence: &AnnotatedSentence) -> SentenceFunction {
    let text = sentence.text.trim_end();
    if text.ends_with('?') {
        return SentenceFunction::Interrogative;
    }
    if text.ends_with('!') {
        return SentenceFunction::Exclamatory;
    }

    let words: Vec<&Token> = sentence
        .tokens
        .iter()
        .filter(|t| t.text.chars().any(char::is_alphanumeric))
        .collect();
    let Some(first) = words.first() else {
        return SentenceFunction::Declarative;
    };
    let first_word = bare(first);

    if let Some(second) = words.get(1) {
        let second_is_aux = second.pos == "AUX" || second.tag == "MD";
        if WH_WORDS.contains(&first_word.as_str()) && second_is_aux {
            return SentenceFunction::Interrogative;
        }
        let first_is_aux = first.pos == "AUX" || first.tag == "MD";
        if first_is_aux && second.pos == "PRON" && AUX_DEPS.contains(&first.dep.as_str()) {
            return SentenceFunction::Interrogative;
        }
    }

    let has_subject = sentence.tokens.iter().any(|t| t.dep.starts_with("nsubj"));
    if first.tag == "VB" && !has_subject {
        return SentenceFunction::Imperative;
    }

    SentenceFunction::Declarative
}

/// Full classification of one sentence.
pub fn annotate(sentence: &AnnotatedSentence) -> SentenceAnnotation {
    SentenceAnnotation {
        text: sentence.text.clone(),
        structure: classify_structure(&sentence.tokens),
        features: detect_features(&sentence.tokens),
        tenses: detect_tenses(&sentence.tokens),
        function: classify_function(sentence),
        cefr_band: None,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn structure_classification() {
        assert_eq!(
            classify_structure(&perfect_continuous_complex().tokens),
            SentenceStructure::Complex
        );
        assert_eq!(
            classify_structure(&passive_compound().tokens),
            SentenceStructure::Compound
        );
        assert_eq!(
            classify_structure(&imperative().tokens),
            SentenceStructure::Simple
        );
    }

    #[test]
    fn noun_coordination_is_not_compound() {
        let s = parsed(
            "I like tea and coffee",
            &[
                ("I", "PRON", "PRP", "nsubj", 1),
                ("like", "VERB", "VBP", "ROOT", 1),
                ("tea", "NOUN", "NN", "dobj", 1),
                ("and", "CCONJ", "CC", "cc", 2),
                ("coffee", "NOUN", "NN", "conj", 2),
            ],
        );
        assert_eq!(classify_structure(&s.tokens), SentenceStructure::Simple);
    }

    #[test]
    fn structure_without_parse_uses_word_lists() {
        let s = AnnotatedSentence::plain("I stayed in because it rained and I was tired");
        assert_eq!(
            classify_structure(&s.tokens),
            SentenceStructure::CompoundComplex
        );
        let s = AnnotatedSentence::plain("And then we left");
        assert_eq!(classify_structure(&s.tokens), SentenceStructure::Simple);
    }

    #[test]
    fn feature_detection() {
        assert_eq!(
            detect_features(&passive_compound().tokens),
            vec![GrammarFeature::Passive]
        );
        assert_eq!(
            detect_features(&conditional_future().tokens),
            vec![GrammarFeature::Modal, GrammarFeature::Conditional]
        );
        assert_eq!(
            detect_features(&relative_clause().tokens),
            vec![GrammarFeature::Relative]
        );
    }

    #[test]
    fn tense_detection() {
        assert_eq!(
            detect_tenses(&perfect_continuous_complex().tokens),
            vec![
                Tense::new(TimeFrame::Present, Aspect::PerfectContinuous),
                Tense::new(TimeFrame::Past, Aspect::Simple),
            ]
        );
        assert_eq!(
            detect_tenses(&conditional_future().tokens),
            vec![
                Tense::new(TimeFrame::Present, Aspect::Simple),
                Tense::new(TimeFrame::Future, Aspect::Simple),
            ]
        );
        // "was built" is a past simple passive, not a continuous.
        assert_eq!(
            detect_tenses(&passive_compound().tokens),
            vec![Tense::new(TimeFrame::Past, Aspect::Simple)]
        );
        // Copula as predicate.
        assert_eq!(
            detect_tenses(&relative_clause().tokens),
            vec![Tense::new(TimeFrame::Present, Aspect::Simple)]
        );
        // Imperatives have no finite group.
        assert!(detect_tenses(&imperative().tokens).is_empty());
    }

    #[test]
    fn function_classification() {
        assert_eq!(
            classify_function(&imperative()),
            SentenceFunction::Imperative
        );
        assert_eq!(
            classify_function(&inverted_question()),
            SentenceFunction::Interrogative
        );
        assert_eq!(
            classify_function(&AnnotatedSentence::plain("Is it far?")),
            SentenceFunction::Interrogative
        );
        assert_eq!(
            classify_function(&AnnotatedSentence::plain("What a day!")),
            SentenceFunction::Exclamatory
        );
        assert_eq!(
            classify_function(&relative_clause()),
            SentenceFunction::Declarative
        );
    }
}
