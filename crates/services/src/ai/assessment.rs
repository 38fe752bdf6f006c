use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static THEORY_SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:theory|теория)\W{0,6}(\d{1,3})\s*%").expect("valid theory score regex")
});
static PRACTICE_SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:practice|практика)\W{0,6}(\d{1,3})\s*%")
        .expect("valid practice score regex")
});

/// Coarse verdict derived from the mean score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentBand {
    Excellent,
    Good,
    Average,
    NeedsWork,
}

impl AssessmentBand {
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            85.. => Self::Excellent,
            70..=84 => Self::Good,
            50..=69 => Self::Average,
            _ => Self::NeedsWork,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent result",
            Self::Good => "Good level",
            Self::Average => "Average level",
            Self::NeedsWork => "Needs more work",
        }
    }
}

/// Scores read back from the closing report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub theory: Option<u8>,
    pub practice: Option<u8>,
}

impl Assessment {
    /// Read `Theory: X%` / `Practice: Y%` lines; `None` when neither is present.
    #[must_use]
    pub fn parse(report: &str) -> Option<Self> {
        let theory = score(&THEORY_SCORE, report);
        let practice = score(&PRACTICE_SCORE, report);
        if theory.is_none() && practice.is_none() {
            return None;
        }
        Some(Self { theory, practice })
    }

    /// Mean of the available scores, rounded half up.
    #[must_use]
    pub fn overall(&self) -> u8 {
        let scores: Vec<u16> = [self.theory, self.practice]
            .into_iter()
            .flatten()
            .map(u16::from)
            .collect();
        if scores.is_empty() {
            return 0;
        }
        let len = scores.len() as u16;
        let mean = (scores.iter().sum::<u16>() + len / 2) / len;
        u8::try_from(mean).unwrap_or(100)
    }

    #[must_use]
    pub fn band(&self) -> AssessmentBand {
        AssessmentBand::from_score(self.overall())
    }
}

fn score(pattern: &Regex, text: &str) -> Option<u8> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .map(|value| u8::try_from(value.min(100)).unwrap_or(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_markdown_scores() {
        let report = "**Theory:** 80%\n**Practice:** 65%\n**Verdict:** solid";
        let assessment = Assessment::parse(report).unwrap();

        assert_eq!(assessment.theory, Some(80));
        assert_eq!(assessment.practice, Some(65));
        assert_eq!(assessment.overall(), 73);
        assert_eq!(assessment.band(), AssessmentBand::Good);
    }

    #[test]
    fn reads_cyrillic_labels() {
        let report = "**Теория:** 90%\n**Практика:** 90 %";
        let assessment = Assessment::parse(report).unwrap();
        assert_eq!(assessment.overall(), 90);
        assert_eq!(assessment.band(), AssessmentBand::Excellent);
    }

    #[test]
    fn partial_and_missing_scores() {
        let only_practice = Assessment::parse("Practice: 40%").unwrap();
        assert_eq!(only_practice.theory, None);
        assert_eq!(only_practice.band(), AssessmentBand::NeedsWork);

        assert!(Assessment::parse("no numbers here").is_none());
    }

    #[test]
    fn scores_are_capped_at_100() {
        let assessment = Assessment::parse("Theory: 250%").unwrap();
        assert_eq!(assessment.theory, Some(100));
    }
}
