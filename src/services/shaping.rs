//! Contextual shaping for Arabic-script names stamped into PDFs.
//!
//! PDF text operators place glyphs left to right with no bidi engine, so
//! the shaper picks the correct presentation form for each letter and
//! reverses the result into visual order. Latin text passes through
//! untouched.

use std::collections::{HashMap, HashSet};

/// Presentation forms per base letter: isolated, initial, medial, final.
const FORMS: &[(char, [char; 4])] = &[
    ('ء', ['ء', 'ء', 'ء', 'ء']),
    ('آ', ['آ', 'آ', 'آ', 'آ']),
    ('أ', ['أ', 'أ', 'أ', 'أ']),
    ('ؤ', ['ؤ', 'ؤ', 'ؤ', 'ؤ']),
    ('إ', ['إ', 'إ', 'إ', 'إ']),
    ('ئ', ['ئ', 'ئ', 'ﺌ', 'ﺊ']),
    ('ا', ['ا', 'ا', 'ا', 'ا']),
    ('ب', ['ﺏ', 'ﺑ', 'ﺒ', 'ﺐ']),
    ('ت', ['ﺕ', 'ﺗ', 'ﺘ', 'ﺖ']),
    ('ث', ['ﺙ', 'ﺛ', 'ﺜ', 'ﺚ']),
    ('ج', ['ﺝ', 'ﺟ', 'ﺠ', 'ﺞ']),
    ('ح', ['ﺡ', 'ﺣ', 'ﺤ', 'ﺢ']),
    ('خ', ['ﺥ', 'ﺧ', 'ﺨ', 'ﺦ']),
    ('د', ['ﺩ', 'ﺩ', 'ﺩ', 'ﺩ']),
    ('ذ', ['ﺫ', 'ﺫ', 'ﺫ', 'ﺫ']),
    ('ر', ['ﺭ', 'ﺭ', 'ﺭ', 'ﺭ']),
    ('ز', ['ﺯ', 'ﺯ', 'ﺯ', 'ﺯ']),
    ('س', ['ﺱ', 'ﺳ', 'ﺴ', 'ﺲ']),
    ('ش', ['ﺵ', 'ﺷ', 'ﺸ', 'ﺶ']),
    ('ص', ['ﺹ', 'ﺻ', 'ﺼ', 'ﺺ']),
    ('ض', ['ﺽ', 'ﺿ', 'ﻀ', 'ﺾ']),
    ('ط', ['ﻁ', 'ﻃ', 'ﻂ', 'ﻂ']),
    ('ظ', ['ﻅ', 'ﻇ', 'ﻈ', 'ﻆ']),
    ('ع', ['ﻉ', 'ﻋ', 'ﻌ', 'ﻊ']),
    ('غ', ['ﻍ', 'ﻏ', 'ﻐ', 'ﻎ']),
    ('ف', ['ﻑ', 'ﻓ', 'ﻔ', 'ﻒ']),
    ('ق', ['ﻕ', 'ﻗ', 'ﻘ', 'ﻖ']),
    ('ك', ['ﻙ', 'ﻛ', 'ﻜ', 'ﻚ']),
    ('ل', ['ﻝ', 'ﻟ', 'ﻠ', 'ﻞ']),
    ('م', ['ﻡ', 'ﻣ', 'ﻤ', 'ﻢ']),
    ('ن', ['ﻥ', 'ﻧ', 'ﻨ', 'ﻦ']),
    ('ه', ['ﻩ', 'ﻫ', 'ﻬ', 'ﻪ']),
    ('و', ['ﻭ', 'ﻭ', 'ﻭ', 'ﻭ']),
    ('ي', ['ﻱ', 'ﻳ', 'ﻴ', 'ﻲ']),
    ('ة', ['ﺓ', 'ﺓ', 'ﺔ', 'ﺔ']),
    ('ى', ['ﻯ', 'ﻯ', 'ﻰ', 'ﻰ']),
    ('ﻻ', ['ﻻ', 'ﻻ', 'ﻼ', 'ﻼ']),
    ('ﻷ', ['ﻷ', 'ﻷ', 'ﻸ', 'ﻸ']),
    ('ﻹ', ['ﻹ', 'ﻹ', 'ﻺ', 'ﻺ']),
    ('ﻵ', ['ﻵ', 'ﻵ', 'ﻶ', 'ﻶ']),
];

/// Letters (and punctuation) that never join to the following character.
const NON_CONNECTORS: &[char] =
    &['ا', 'إ', 'أ', 'آ', 'د', 'ذ', 'ر', 'ز', 'و', 'ؤ', ' ', '.', '،', '!'];

const LAM: char = 'ل';

/// Lam-alef pairs collapse into a single ligature before shaping.
const LAM_ALEF: &[(char, char)] = &[('ا', 'ﻻ'), ('أ', 'ﻷ'), ('إ', 'ﻹ'), ('آ', 'ﻵ')];

/// Immutable lookup tables, built once at startup and shared by reference.
pub(crate) struct ShapingTables {
    forms: HashMap<char, [char; 4]>,
    non_connectors: HashSet<char>,
}

impl ShapingTables {
    pub(crate) fn new() -> Self {
        Self {
            forms: FORMS.iter().copied().collect(),
            non_connectors: NON_CONNECTORS.iter().copied().collect(),
        }
    }

    /// Shapes `input` into visual order for LTR glyph placement. Strings
    /// without any character in the Arabic block are returned unchanged.
    pub(crate) fn shape(&self, input: &str) -> String {
        if input.is_empty() {
            return String::new();
        }

        if !input.chars().any(is_arabic_block) {
            return input.to_string();
        }

        let chars = self.collapse_lam_alef(input);

        let mut shaped = Vec::with_capacity(chars.len());
        for (i, &current) in chars.iter().enumerate() {
            let Some(forms) = self.forms.get(&current) else {
                shaped.push(current);
                continue;
            };

            let prev_connects = i > 0
                && self.connects(chars[i - 1])
                && !self.non_connectors.contains(&chars[i - 1]);
            let next_connects = i + 1 < chars.len() && self.connects(chars[i + 1]);

            let form = if prev_connects && next_connects {
                forms[2]
            } else if prev_connects {
                forms[3]
            } else if next_connects && !self.non_connectors.contains(&current) {
                forms[1]
            } else {
                forms[0]
            };
            shaped.push(form);
        }

        shaped.iter().rev().collect()
    }

    fn connects(&self, c: char) -> bool {
        self.forms.contains_key(&c)
    }

    fn collapse_lam_alef(&self, input: &str) -> Vec<char> {
        let chars: Vec<char> = input.chars().collect();
        let mut out = Vec::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == LAM && i + 1 < chars.len() {
                if let Some(&(_, ligature)) =
                    LAM_ALEF.iter().find(|(alef, _)| *alef == chars[i + 1])
                {
                    out.push(ligature);
                    i += 2;
                    continue;
                }
            }
            out.push(chars[i]);
            i += 1;
        }
        out
    }
}

fn is_arabic_block(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> ShapingTables {
        ShapingTables::new()
    }

    #[test]
    fn empty_input_yields_empty() {
        assert_eq!(tables().shape(""), "");
    }

    #[test]
    fn latin_text_passes_through_unreversed() {
        assert_eq!(tables().shape("John Smith"), "John Smith");
    }

    #[test]
    fn single_letter_uses_isolated_form() {
        assert_eq!(tables().shape("ب"), "ﺏ");
    }

    #[test]
    fn two_joining_letters_get_initial_and_final_forms() {
        // بت: ba joins forward (initial), ta receives the join (final).
        let shaped: Vec<char> = tables().shape("بت").chars().collect();
        assert_eq!(shaped, vec!['ﺖ', 'ﺑ']);
    }

    #[test]
    fn letter_after_non_connector_is_not_final() {
        // دب: dal never joins forward, so ba stays isolated.
        let shaped: Vec<char> = tables().shape("دب").chars().collect();
        assert_eq!(shaped, vec!['ﺏ', 'ﺩ']);
    }

    #[test]
    fn three_letters_produce_a_medial_form() {
        // بتب: middle ta takes the medial form.
        let shaped: Vec<char> = tables().shape("بتب").chars().collect();
        assert_eq!(shaped, vec!['ﺐ', 'ﺘ', 'ﺑ']);
    }

    #[test]
    fn lam_alef_collapses_to_ligature() {
        let shaped = tables().shape("لا");
        assert_eq!(shaped, "ﻻ");
    }

    #[test]
    fn lam_alef_after_connector_uses_final_ligature() {
        // بلا: the ligature follows a joining ba, so it takes its final form.
        let shaped: Vec<char> = tables().shape("بلا").chars().collect();
        assert_eq!(shaped, vec!['ﻼ', 'ﺑ']);
    }

    #[test]
    fn output_is_reversed_into_visual_order() {
        let input = "محمد";
        let shaped: Vec<char> = tables().shape(input).chars().collect();
        assert_eq!(shaped.len(), 4);
        // mim opens the word, so shaped output ends with its initial form.
        assert_eq!(*shaped.last().unwrap(), 'ﻣ');
        // dal closes the word and never joins, final position in logical
        // order means first in visual order.
        assert_eq!(shaped[0], 'ﺩ');
    }

    #[test]
    fn mixed_text_shapes_only_arabic_runs() {
        let shaped = tables().shape("abc");
        assert_eq!(shaped, "abc");

        // A digit embedded in an Arabic string survives, just repositioned.
        let shaped = tables().shape("ب1");
        assert!(shaped.contains('1'));
    }
}
