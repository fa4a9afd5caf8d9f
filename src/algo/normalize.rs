use unicode_segmentation::UnicodeSegmentation;

/// A column name reduced to comparable tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedName {
    tokens: Vec<String>,
}

impl NormalizedName {
    pub fn new(raw: &str) -> Self {
        Self {
            tokens: tokenize(raw),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens joined by a single space, e.g. "nombre completo".
    pub fn joined(&self) -> String {
        self.tokens.join(" ")
    }

    /// Tokens concatenated, e.g. "nombrecompleto".
    pub fn compact(&self) -> String {
        self.tokens.concat()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// True when `needle` appears as a contiguous run of tokens.
    pub fn contains_tokens(&self, needle: &[String]) -> bool {
        if needle.is_empty() || needle.len() > self.tokens.len() {
            return false;
        }
        self.tokens.windows(needle.len()).any(|w| w == needle)
    }
}

/// Lowercase, fold accents, and split on every non-alphanumeric boundary.
///
/// Underscores split too, so `nombre_completo` and `Nombre Completo`
/// produce the same tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let folded = fold(text);
    folded
        .unicode_words()
        .flat_map(|w| w.split(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize a single keyword or name to its space-joined token form.
pub fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Lowercase and strip diacritics from Latin letters.
pub fn fold(text: &str) -> String {
    text.to_lowercase().chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Lowercase ASCII slug for filenames, tokens joined with `_`.
pub fn slug(text: &str) -> String {
    tokenize(text)
        .into_iter()
        .map(|t| t.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_spaces_and_underscores() {
        assert_eq!(tokenize("Nombre Completo"), vec!["nombre", "completo"]);
        assert_eq!(tokenize("nombre_completo"), vec!["nombre", "completo"]);
    }

    #[test]
    fn tokenize_folds_accents() {
        assert_eq!(tokenize("Teléfono Móvil"), vec!["telefono", "movil"]);
        assert_eq!(tokenize("AÑO"), vec!["ano"]);
    }

    #[test]
    fn tokenize_splits_punctuation() {
        assert_eq!(tokenize("E-mail (principal)"), vec!["e", "mail", "principal"]);
        assert_eq!(tokenize("fecha.nacimiento"), vec!["fecha", "nacimiento"]);
    }

    #[test]
    fn tokenize_blank() {
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("###").is_empty());
    }

    #[test]
    fn joined_and_compact() {
        let n = NormalizedName::new("  Razón   Social ");
        assert_eq!(n.joined(), "razon social");
        assert_eq!(n.compact(), "razonsocial");
    }

    #[test]
    fn contains_tokens_contiguous() {
        let n = NormalizedName::new("fecha de nacimiento");
        assert!(n.contains_tokens(&["de".into(), "nacimiento".into()]));
        assert!(!n.contains_tokens(&["fecha".into(), "nacimiento".into()]));
        assert!(!n.contains_tokens(&[]));
    }

    #[test]
    fn slug_is_ascii() {
        assert_eq!(slug("Clientes 2024 (Ñandú)"), "clientes_2024_nandu");
        assert_eq!(slug("***"), "");
    }
}
