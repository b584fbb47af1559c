//! Offline classifier matching explicit acknowledgement statements.

use async_trait::async_trait;
use regex::Regex;

use super::{ClassifyError, TextClassifier, OFFICE_ACRONYM};
use crate::models::Verdict;

/// Answers YES when a single clause attributes funding or support to the
/// office, or acknowledges it, and nothing in that clause negates it.
///
/// The full office name is folded into the acronym first, so both spellings
/// go through the same clause rules. The acronym only counts in upper case.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    office_name: Regex,
    clause_break: Regex,
    attribution: Regex,
    acknowledgement: Regex,
    compound: Regex,
    negation: Regex,
}

impl KeywordClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        let office = format!(r"\b{}\b", regex::escape(OFFICE_ACRONYM));
        Ok(Self {
            office_name: Regex::new(
                r"(?i)directorate\s+of\s+research[\s,]+innovation[\s,]+(?:and|&)\s+consultancy",
            )?,
            clause_break: Regex::new(r"[.!?;:,](?:\s+|$)|\n\s*\n|\s+(?i:but|whereas|while)\s+")?,
            attribution: Regex::new(&format!(
                r"(?s)(?i:\b(?:fund(?:ed|ing|s)?|support(?:ed|s)?|sponsor(?:ed|ship|s)?|grants?|financ(?:ed|ing|ial)|award(?:ed)?)\b.*?\b(?:by|from|of|through|under)\s+)(?:[\w'&-]+\s+){{0,3}}{}",
                office
            ))?,
            acknowledgement: Regex::new(&format!(
                r"(?s)(?i:\b(?:acknowledg(?:e|es|ed|ing|ement|ements)|thanks?|thanked|grateful|gratitude|indebted)\b).*?{}",
                office
            ))?,
            compound: Regex::new(&format!(
                r"{}(?i:[\s-]+(?:funded|sponsored|supported|financed))\b",
                office
            ))?,
            negation: Regex::new(r"(?i)\b(?:no|not|without|none|neither|nor|never)\b|n't\b")?,
        })
    }

    /// Decide synchronously
    pub fn verdict(&self, text: &str) -> Verdict {
        let text = self.office_name.replace_all(text, OFFICE_ACRONYM);
        let explicit = self
            .clause_break
            .split(&text)
            .any(|clause| self.attributes_to_office(clause));

        if explicit {
            Verdict::Yes
        } else {
            Verdict::No
        }
    }

    fn attributes_to_office(&self, clause: &str) -> bool {
        let attributed = self.attribution.is_match(clause)
            || self.acknowledgement.is_match(clause)
            || self.compound.is_match(clause);
        attributed && !self.negation.is_match(clause)
    }
}

#[async_trait]
impl TextClassifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify_text(&self, text: &str) -> Result<Verdict, ClassifyError> {
        Ok(self.verdict(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new().unwrap()
    }

    #[test]
    fn test_explicit_funding_statement() {
        assert_eq!(
            classifier().verdict("Funded by the Directorate of Research, Innovation and Consultancy"),
            Verdict::Yes
        );
    }

    #[test]
    fn test_acronym_with_cue() {
        let text = "## Acknowledgements\n\nThis study was supported by a DRIC research grant. We thank the farmers.";
        assert_eq!(classifier().verdict(text), Verdict::Yes);
    }

    #[test]
    fn test_name_without_commas() {
        let text = "The authors acknowledge the Directorate of Research Innovation & Consultancy, UCC.";
        assert_eq!(classifier().verdict(text), Verdict::Yes);
    }

    #[test]
    fn test_generic_acknowledgement_is_no() {
        let text = "Acknowledgements. We thank all participants and the anonymous reviewers for their support.";
        assert_eq!(classifier().verdict(text), Verdict::No);
    }

    #[test]
    fn test_other_body_is_no() {
        let text = "This work was funded by the National Science Foundation under grant 1234.";
        assert_eq!(classifier().verdict(text), Verdict::No);
    }

    #[test]
    fn test_mention_without_cue_is_no() {
        let text = "Questionnaires were distributed at the DRIC building. The response rate was 80%.";
        assert_eq!(classifier().verdict(text), Verdict::No);
    }

    #[test]
    fn test_cue_and_office_in_different_sentences_is_no() {
        let text = "We received funding from the Ghana Cocoa Board. Data were archived by DRIC staff.";
        assert_eq!(classifier().verdict(text), Verdict::No);
    }

    #[test]
    fn test_negated_funding_is_no() {
        let text = "The authors received no funding from DRIC for this study.";
        assert_eq!(classifier().verdict(text), Verdict::No);

        let text = "This research was not supported by the Directorate of Research, Innovation and Consultancy.";
        assert_eq!(classifier().verdict(text), Verdict::No);
    }

    #[test]
    fn test_other_funder_with_office_disclaimed_is_no() {
        let text = "This work was funded by the Ghana Cocoa Board, not by DRIC.";
        assert_eq!(classifier().verdict(text), Verdict::No);
    }

    #[test]
    fn test_office_as_location_after_cue_is_no() {
        let text = "Funding was provided by the Ghana Cocoa Board and interviews were held at DRIC offices.";
        assert_eq!(classifier().verdict(text), Verdict::No);
    }

    #[test]
    fn test_full_name_with_institution_is_yes() {
        let text = "This study was funded by the Directorate of Research, Innovation and Consultancy (DRIC), University of Cape Coast.";
        assert_eq!(classifier().verdict(text), Verdict::Yes);
    }

    #[test]
    fn test_compound_attribution_is_yes() {
        let text = "Data come from a DRIC-funded survey of cocoa farmers.";
        assert_eq!(classifier().verdict(text), Verdict::Yes);
    }

    #[test]
    fn test_lowercase_acronym_is_not_matched() {
        let text = "This was funded by dric.";
        assert_eq!(classifier().verdict(text), Verdict::No);
    }
}
