use crate::error::{ApiError, FieldErrors};
use crate::types::{Achievement, Category, Status};

/// Optional achievement criteria, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchievementFilter {
    pub student_id: Option<u64>,
    pub status: Option<Status>,
    pub category: Option<Category>,
}

impl AchievementFilter {
    pub fn for_student(student_id: u64) -> Self {
        Self {
            student_id: Some(student_id),
            ..Self::default()
        }
    }

    pub fn pending() -> Self {
        Self {
            status: Some(Status::Pending),
            ..Self::default()
        }
    }

    /// Reads `student_id`, `status` and `category` from query parameters.
    /// Empty values are ignored, unknown keys are ignored, bad values are a 400.
    pub fn from_query<'a, I>(params: I) -> Result<Self, ApiError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = Self::default();
        let mut errors = FieldErrors::new();
        for (key, value) in params {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "student_id" | "student" => match value.parse() {
                    Ok(id) => filter.student_id = Some(id),
                    Err(_) => errors.add(key, "Enter a number."),
                },
                "status" => match value.parse() {
                    Ok(status) => filter.status = Some(status),
                    Err(e) => errors.add(key, select_message(e)),
                },
                "category" => match value.parse() {
                    Ok(category) => filter.category = Some(category),
                    Err(e) => errors.add(key, select_message(e)),
                },
                _ => {}
            }
        }
        errors.into_result()?;
        Ok(filter)
    }

    pub fn matches(&self, achievement: &Achievement) -> bool {
        self.student_id.map_or(true, |id| achievement.student == id)
            && self.status.map_or(true, |s| achievement.status == s)
            && self.category.map_or(true, |c| achievement.category == c)
    }
}

fn select_message(e: crate::types::InvalidChoice) -> String {
    format!(
        "Select a valid choice. {} is not one of the available choices.",
        e.0
    )
}
