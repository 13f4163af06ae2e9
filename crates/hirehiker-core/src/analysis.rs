//! AI-generated scoring of a session transcript

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of strengths/improvements kept per analysis
pub const MAX_FEEDBACK_ITEMS: usize = 5;

/// Per-dimension question quality scores (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DimensionScores {
    /// Questions are easy to understand
    pub clarity: f64,
    /// Questions target a concrete file, function or symptom
    pub specificity: f64,
    /// Questions share what was already tried or observed
    pub context: f64,
    /// Questions move toward a fix (hypotheses, narrowing down)
    pub problem_solving: f64,
}

impl DimensionScores {
    /// Clamp every dimension into 0-100, mapping NaN to 0
    pub fn clamped(self) -> Self {
        Self {
            clarity: clamp_score(self.clarity),
            specificity: clamp_score(self.specificity),
            context: clamp_score(self.context),
            problem_solving: clamp_score(self.problem_solving),
        }
    }

    pub fn average(&self) -> f64 {
        (self.clarity + self.specificity + self.context + self.problem_solving) / 4.0
    }
}

/// Derived scoring record, one per session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub session_id: Uuid,
    /// Overall question quality (0-100)
    pub quality_score: f64,
    pub dimension_scores: DimensionScores,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl Analysis {
    /// Build an analysis, normalizing scores and feedback lists
    pub fn new(
        session_id: Uuid,
        quality_score: f64,
        dimension_scores: DimensionScores,
        strengths: Vec<String>,
        improvements: Vec<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            quality_score: clamp_score(quality_score),
            dimension_scores: dimension_scores.clamped(),
            strengths: normalize_feedback(strengths),
            improvements: normalize_feedback(improvements),
            summary: summary.into().trim().to_string(),
            created_at: Utc::now(),
        }
    }

    /// Letter band shown on the recruiter dashboard
    pub fn grade(&self) -> char {
        grade_for(self.quality_score)
    }
}

/// Letter band for a 0-100 score
pub fn grade_for(score: f64) -> char {
    match score {
        s if s >= 90.0 => 'A',
        s if s >= 80.0 => 'B',
        s if s >= 70.0 => 'C',
        s if s >= 60.0 => 'D',
        _ => 'F',
    }
}

/// Clamp a score into 0-100, mapping NaN to 0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

fn normalize_feedback(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_FEEDBACK_ITEMS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_are_clamped() {
        let analysis = Analysis::new(
            Uuid::new_v4(),
            140.0,
            DimensionScores {
                clarity: -5.0,
                specificity: 50.0,
                context: f64::NAN,
                problem_solving: 101.0,
            },
            vec![],
            vec![],
            "",
        );
        assert_eq!(analysis.quality_score, 100.0);
        assert_eq!(analysis.dimension_scores.clarity, 0.0);
        assert_eq!(analysis.dimension_scores.specificity, 50.0);
        assert_eq!(analysis.dimension_scores.context, 0.0);
        assert_eq!(analysis.dimension_scores.problem_solving, 100.0);
    }

    #[test]
    fn test_feedback_is_trimmed_and_capped() {
        let strengths = (0..8).map(|i| format!("  point {}  ", i)).collect();
        let analysis = Analysis::new(
            Uuid::new_v4(),
            70.0,
            DimensionScores::default(),
            strengths,
            vec!["".to_string(), "ask earlier".to_string()],
            "  ok  ",
        );
        assert_eq!(analysis.strengths.len(), MAX_FEEDBACK_ITEMS);
        assert_eq!(analysis.strengths[0], "point 0");
        assert_eq!(analysis.improvements, vec!["ask earlier".to_string()]);
        assert_eq!(analysis.summary, "ok");
    }

    #[test]
    fn test_grades() {
        assert_eq!(grade_for(95.0), 'A');
        assert_eq!(grade_for(90.0), 'A');
        assert_eq!(grade_for(85.5), 'B');
        assert_eq!(grade_for(70.0), 'C');
        assert_eq!(grade_for(60.0), 'D');
        assert_eq!(grade_for(12.0), 'F');
    }

    #[test]
    fn test_dimension_average() {
        let scores = DimensionScores {
            clarity: 80.0,
            specificity: 60.0,
            context: 40.0,
            problem_solving: 20.0,
        };
        assert_eq!(scores.average(), 50.0);
    }
}
