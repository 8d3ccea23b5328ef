//! Request bodies and their validation rules.
//!
//! Every rule runs and every failure is reported, so a client fixing a form sees
//! all problems at once.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::{DiaryStatus, MoodDegree};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiaryRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub emotion: Option<String>,
    pub status: Option<String>,
    pub tag_names: Option<Vec<String>>,
    pub thumbnail: Option<String>,
    pub mood: Option<MoodDegree>,
    pub summary: Option<String>,
}

/// Validated diary contents, ready for the repository.
#[derive(Debug, Clone)]
pub struct DiaryInput {
    pub title: String,
    pub content: String,
    pub emotion: String,
    pub status: DiaryStatus,
    pub tag_names: Vec<String>,
    pub thumbnail: Option<String>,
    pub mood: MoodDegree,
    pub summary: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDiaryRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub emotion: Option<String>,
    pub status: Option<String>,
    pub tag_names: Option<Vec<String>>,
    pub thumbnail: Option<String>,
    pub mood: Option<MoodDegree>,
    pub summary: Option<String>,
}

/// Fields the author asked to change; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct DiaryPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub emotion: Option<String>,
    pub status: Option<DiaryStatus>,
    pub tag_names: Option<Vec<String>>,
    pub thumbnail: Option<String>,
    pub mood: Option<MoodDegree>,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReactionRequest {
    pub reaction: Option<String>,
}

fn not_empty(field: &str, value: Option<String>, errors: &mut Vec<String>) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            errors.push(format!("{field} should not be empty"));
            None
        }
    }
}

fn status_rule(raw: Option<&str>, required: bool, errors: &mut Vec<String>) -> Option<DiaryStatus> {
    let parsed = raw.and_then(DiaryStatus::parse);
    if parsed.is_none() && (required || raw.is_some()) {
        errors.push(format!("status must be one of the following values: {}", DiaryStatus::ALLOWED));
    }
    if required && raw.map_or(true, str::is_empty) {
        errors.push("status should not be empty".to_string());
    }
    parsed
}

pub fn validate_create(req: CreateDiaryRequest) -> Result<DiaryInput, ApiError> {
    let mut errors = Vec::new();
    let title = not_empty("title", req.title, &mut errors);
    let content = not_empty("content", req.content, &mut errors);
    let emotion = not_empty("emotion", req.emotion, &mut errors);
    let status = status_rule(req.status.as_deref(), true, &mut errors);

    match (title, content, emotion, status) {
        (Some(title), Some(content), Some(emotion), Some(status)) if errors.is_empty() => Ok(DiaryInput {
            title,
            content,
            emotion,
            status,
            tag_names: req.tag_names.unwrap_or_default(),
            thumbnail: req.thumbnail,
            mood: req.mood.unwrap_or_default(),
            summary: req.summary.unwrap_or_default(),
        }),
        _ => Err(ApiError::Validation(errors)),
    }
}

pub fn validate_update(req: UpdateDiaryRequest) -> Result<DiaryPatch, ApiError> {
    let mut errors = Vec::new();
    let title = req.title.and_then(|t| not_empty("title", Some(t), &mut errors));
    let content = req.content.and_then(|c| not_empty("content", Some(c), &mut errors));
    let emotion = req.emotion.and_then(|e| not_empty("emotion", Some(e), &mut errors));
    let status = status_rule(req.status.as_deref(), false, &mut errors);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    Ok(DiaryPatch {
        title,
        content,
        emotion,
        status,
        tag_names: req.tag_names,
        thumbnail: req.thumbnail,
        mood: req.mood,
        summary: req.summary,
    })
}

pub fn validate_reaction(req: ReactionRequest) -> Result<String, ApiError> {
    let mut errors = Vec::new();
    not_empty("reaction", req.reaction, &mut errors).ok_or(ApiError::Validation(errors))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(err: ApiError) -> Vec<String> {
        match err {
            ApiError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_body_reports_all_five_rules() {
        let m = messages(validate_create(CreateDiaryRequest::default()).unwrap_err());
        assert_eq!(m.len(), 5);
        for expected in [
            "title should not be empty",
            "content should not be empty",
            "emotion should not be empty",
            "status must be one of the following values: private, public",
            "status should not be empty",
        ] {
            assert!(m.iter().any(|x| x == expected), "missing {expected}");
        }
    }

    #[test]
    fn wrong_status_reports_only_the_enum_rule() {
        let req = CreateDiaryRequest {
            title: Some("일기 제목".into()),
            content: Some("일기 내용".into()),
            emotion: Some("🐶".into()),
            status: Some("wrong status".into()),
            ..Default::default()
        };
        let m = messages(validate_create(req).unwrap_err());
        assert_eq!(m, vec!["status must be one of the following values: private, public".to_string()]);
    }

    #[test]
    fn complete_body_fills_defaults() {
        let req = CreateDiaryRequest {
            title: Some("t".into()),
            content: Some("c".into()),
            emotion: Some("🐶".into()),
            status: Some("private".into()),
            ..Default::default()
        };
        let input = validate_create(req).unwrap();
        assert_eq!(input.status, DiaryStatus::Private);
        assert_eq!(input.mood, MoodDegree::SoSo);
        assert!(input.tag_names.is_empty());
    }

    #[test]
    fn empty_update_is_a_noop_patch() {
        let patch = validate_update(UpdateDiaryRequest::default()).unwrap();
        assert!(patch.title.is_none() && patch.status.is_none() && patch.tag_names.is_none());
    }

    #[test]
    fn update_rejects_blank_required_fields_but_keeps_blank_optional_ones() {
        let bad = UpdateDiaryRequest { title: Some("  ".into()), ..Default::default() };
        assert_eq!(messages(validate_update(bad).unwrap_err()), vec!["title should not be empty".to_string()]);

        let ok = UpdateDiaryRequest { summary: Some(String::new()), ..Default::default() };
        assert_eq!(validate_update(ok).unwrap().summary, Some(String::new()));
    }

    #[test]
    fn blank_reaction_is_rejected() {
        assert!(validate_reaction(ReactionRequest { reaction: Some(" ".into()) }).is_err());
        assert_eq!(validate_reaction(ReactionRequest { reaction: Some("👍".into()) }).unwrap(), "👍");
    }
}
