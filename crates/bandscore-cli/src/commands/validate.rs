//! The `bandscore validate` command.

use std::path::PathBuf;

use anyhow::Result;

use bandscore_core::parser;

pub fn execute(path: PathBuf) -> Result<()> {
    let warnings = if path.is_dir() {
        let answers = parser::load_answer_directory(&path)?;
        anyhow::ensure!(!answers.is_empty(), "no answer files found in {}", path.display());
        answers
            .iter()
            .flat_map(|answer| {
                println!(
                    "Answer: {} ({} words)",
                    answer.id,
                    answer.transcript.split_whitespace().count()
                );
                parser::validate_answer(answer)
            })
            .collect::<Vec<_>>()
    } else if path.extension().is_some_and(|ext| ext == "toml") {
        let session = parser::parse_session(&path)?;
        println!("Session: {} ({} answers)", session.name, session.answers.len());
        parser::validate_session(&session)
    } else {
        let answer = parser::parse_answer(&path)?;
        println!(
            "Answer: {} ({} words)",
            answer.id,
            answer.transcript.split_whitespace().count()
        );
        parser::validate_answer(&answer)
    };

    for w in &warnings {
        let prefix = w
            .answer_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("All answers valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
