//! Validation rules shared by the create and edit flows.

use serde::Serialize;

use crate::domain::entities::CategoryRecord;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Raw form values of a post as submitted by the editor. Kept as strings so a
/// rejected submission can be shown back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostSubmission {
    pub title: String,
    pub description: String,
    pub body: String,
    pub category_id: String,
}

/// Submission that passed every rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub description: String,
    pub body: String,
    pub category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Ordered list of rule violations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn first(&self) -> Option<&FieldError> {
        self.errors.first()
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }
}

pub fn validate_post(submission: &PostSubmission, categories: &[CategoryRecord]) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_text(
        &mut report,
        "title",
        "Title",
        &submission.title,
        Some(TITLE_MAX_CHARS),
    );
    check_text(
        &mut report,
        "description",
        "Description",
        &submission.description,
        Some(DESCRIPTION_MAX_CHARS),
    );
    check_text(&mut report, "body", "Text", &submission.body, None);

    let category = submission.category_id.trim();
    if category.is_empty() {
        report.push("category_id", "Category is required.");
    } else {
        match category.parse::<i64>() {
            Ok(id) if categories.iter().any(|known| known.id == id) => {}
            _ => report.push("category_id", "Choose an existing category."),
        }
    }

    report
}

fn check_text(
    report: &mut ValidationReport,
    field: &'static str,
    label: &str,
    value: &str,
    max_chars: Option<usize>,
) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        report.push(field, format!("{label} is required."));
        return;
    }
    if let Some(max) = max_chars
        && trimmed.chars().count() > max
    {
        report.push(field, format!("{label} must be at most {max} characters."));
    }
}

impl PostSubmission {
    /// Runs the rule set and converts the submission into a trimmed draft.
    pub fn validated(&self, categories: &[CategoryRecord]) -> Result<PostDraft, ValidationReport> {
        let report = validate_post(self, categories);
        if !report.is_valid() {
            return Err(report);
        }

        let category_id = self
            .category_id
            .trim()
            .parse::<i64>()
            .map_err(|_| report.clone())?;

        Ok(PostDraft {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            body: self.body.trim().to_string(),
            category_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<CategoryRecord> {
        vec![
            CategoryRecord {
                id: 1,
                name: "Politics".to_string(),
            },
            CategoryRecord {
                id: 2,
                name: "Sport".to_string(),
            },
        ]
    }

    fn submission() -> PostSubmission {
        PostSubmission {
            title: "Budget passes".to_string(),
            description: "Parliament approved the budget.".to_string(),
            body: "The vote was close.".to_string(),
            category_id: "1".to_string(),
        }
    }

    #[test]
    fn complete_submission_is_valid() {
        let draft = submission()
            .validated(&categories())
            .expect("submission should pass");

        assert_eq!(draft.category_id, 1);
        assert_eq!(draft.title, "Budget passes");
    }

    #[test]
    fn errors_follow_rule_order() {
        let empty = PostSubmission::default();
        let report = validate_post(&empty, &categories());

        let fields: Vec<_> = report.errors().iter().map(|error| error.field).collect();
        assert_eq!(fields, vec!["title", "description", "body", "category_id"]);
        assert_eq!(
            report.first().map(|error| error.message.as_str()),
            Some("Title is required.")
        );
    }

    #[test]
    fn whitespace_only_title_is_missing() {
        let mut input = submission();
        input.title = "   ".to_string();

        let report = validate_post(&input, &categories());
        assert_eq!(report.message_for("title"), Some("Title is required."));
        assert_eq!(report.errors().len(), 1);
    }

    #[test]
    fn overlong_title_is_rejected() {
        let mut input = submission();
        input.title = "x".repeat(TITLE_MAX_CHARS + 1);

        let report = validate_post(&input, &categories());
        assert_eq!(
            report.message_for("title"),
            Some("Title must be at most 200 characters.")
        );
    }

    #[test]
    fn unknown_or_malformed_category_is_rejected() {
        for raw in ["99", "abc"] {
            let mut input = submission();
            input.category_id = raw.to_string();

            let report = validate_post(&input, &categories());
            assert_eq!(
                report.message_for("category_id"),
                Some("Choose an existing category.")
            );
        }
    }
}
