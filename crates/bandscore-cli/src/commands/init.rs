//! The `bandscore init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create bandscore.toml
    if std::path::Path::new("bandscore.toml").exists() {
        println!("bandscore.toml already exists, skipping.");
    } else {
        std::fs::write("bandscore.toml", SAMPLE_CONFIG)?;
        println!("Created bandscore.toml");
    }

    // Create example answer
    std::fs::create_dir_all("answers")?;
    let example_path = std::path::Path::new("answers/example.json");
    if example_path.exists() {
        println!("answers/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_ANSWER)?;
        println!("Created answers/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Run: bandscore validate --answer answers/example.json");
    println!("  2. Run: bandscore score --answer answers/example.json --format all");
    println!("  3. Point [collaborators] and [backends] in bandscore.toml at your model server");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# bandscore configuration

# Grammar corrector used for Grammatical Range & Accuracy.
# "recorded" replays the corrections stored in each answer file.
grammar_backend = "recorded"
parallelism = 4
output_dir = "./bandscore-results"

# Word-frequency list (word<TAB>zipf) for Lexical Resource. Without it only
# the bundled list of common words is known and everything else reads as rare.
# lexicon = "zipf_en.tsv"

# Segmentation, disfluency tagging, CEFR, fill-mask and forced alignment.
[collaborators]
type = "recorded"

# [collaborators]
# type = "http"
# base_url = "http://localhost:8000"

# [backends.coedit]
# type = "http"
# base_url = "http://localhost:8000"
# model = "grammarly/coedit-large"

# [backends.gpt]
# type = "openai"
# api_key = "${OPENAI_API_KEY}"
# model = "gpt-4o-mini"

[scoring]
long_pause_threshold = 3.0
under_duration_threshold = 0.06
fill_mask_top_k = 5
"#;

const EXAMPLE_ANSWER: &str = include_str!("../../assets/example.json");
