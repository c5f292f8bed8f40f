//! ARPAbet to IPA conversion.

/// Strip the stress digit from an ARPAbet symbol (`AH0` → `AH`).
pub fn strip_stress(symbol: &str) -> &str {
    symbol.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// IPA rendering of an ARPAbet phoneme. Unstressed `AH` and `ER` use the
/// reduced vowels. Unknown symbols return `None`.
pub fn arpabet_to_ipa(symbol: &str) -> Option<&'static str> {
    let upper = symbol.trim().to_ascii_uppercase();
    let unstressed = upper.ends_with('0');
    let ipa = match strip_stress(&upper) {
        "AA" => "ɑ",
        "AE" => "æ",
        "AH" if unstressed => "ə",
        "AH" => "ʌ",
        "AO" => "ɔ",
        "AW" => "aʊ",
        "AY" => "aɪ",
        "EH" => "ɛ",
        "ER" if unstressed => "ɚ",
        "ER" => "ɝ",
        "EY" => "eɪ",
        "IH" => "ɪ",
        "IY" => "i",
        "OW" => "oʊ",
        "OY" => "ɔɪ",
        "UH" => "ʊ",
        "UW" => "u",
        "B" => "b",
        "CH" => "tʃ",
        "D" => "d",
        "DH" => "ð",
        "F" => "f",
        "G" => "ɡ",
        "HH" => "h",
        "JH" => "dʒ",
        "K" => "k",
        "L" => "l",
        "M" => "m",
        "N" => "n",
        "NG" => "ŋ",
        "P" => "p",
        "R" => "ɹ",
        "S" => "s",
        "SH" => "ʃ",
        "T" => "t",
        "TH" => "θ",
        "V" => "v",
        "W" => "w",
        "Y" => "j",
        "Z" => "z",
        "ZH" => "ʒ",
        _ => return None,
    };
    Some(ipa)
}

/// IPA for a symbol, falling back to the lowercase stress-free ARPAbet.
pub fn to_ipa_or_raw(symbol: &str) -> String {
    arpabet_to_ipa(symbol)
        .map(str::to_string)
        .unwrap_or_else(|| strip_stress(symbol).to_lowercase())
}

/// Aligner labels that mark silence rather than speech.
pub fn is_silence(label: &str) -> bool {
    matches!(label.trim().to_ascii_lowercase().as_str(), "" | "sil" | "sp" | "<eps>")
}

/// Spoken-noise label used for out-of-vocabulary speech.
pub fn is_spoken_noise(label: &str) -> bool {
    label.trim().eq_ignore_ascii_case("spn")
}
