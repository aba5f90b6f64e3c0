//! Survey schema documents and answer validation.
//!
//! A survey is a tenant-scoped document of pages, each holding a list of
//! elements. Answers are stored as a JSON object keyed by element name, so
//! element names must be unique across the whole survey.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Schema ──────────────────────────────────────────────────────────────────

/// The question type of an [`Element`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementKind {
  /// Single-line free text.
  Text,
  /// Multi-line free text.
  Comment,
  /// Numeric scale, inclusive on both ends.
  Rating { min: i32, max: i32 },
  /// One value out of a fixed list.
  Choice { options: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
  /// Answer key; unique across the survey.
  pub name:     String,
  pub title:    String,
  #[serde(default)]
  pub required: bool,
  #[serde(flatten)]
  pub kind:     ElementKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
  pub name:     String,
  #[serde(default)]
  pub title:    Option<String>,
  pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SurveySchema {
  pub pages: Vec<Page>,
}

impl SurveySchema {
  pub fn elements(&self) -> impl Iterator<Item = &Element> {
    self.pages.iter().flat_map(|p| p.elements.iter())
  }

  pub fn element(&self, name: &str) -> Option<&Element> {
    self.elements().find(|e| e.name == name)
  }

  /// Structural checks run on every create and update.
  pub fn validate(&self) -> Result<()> {
    if self.pages.is_empty() {
      return Err(Error::InvalidSchema("survey has no pages".into()));
    }

    let mut seen = HashSet::new();
    for element in self.elements() {
      if element.name.trim().is_empty() {
        return Err(Error::InvalidSchema("element with empty name".into()));
      }
      if !seen.insert(element.name.as_str()) {
        return Err(Error::InvalidSchema(format!(
          "duplicate element name {:?}",
          element.name
        )));
      }
      match &element.kind {
        ElementKind::Rating { min, max } if min >= max => {
          return Err(Error::InvalidSchema(format!(
            "rating {:?} has min {min} >= max {max}",
            element.name
          )));
        }
        ElementKind::Choice { options } if options.is_empty() => {
          return Err(Error::InvalidSchema(format!(
            "choice {:?} has no options",
            element.name
          )));
        }
        _ => {}
      }
    }
    Ok(())
  }

  /// Check `answers` against the schema. Required elements are only
  /// enforced when `completed` is set; partial saves may leave gaps.
  pub fn validate_answers(
    &self,
    answers: &Map<String, Value>,
    completed: bool,
  ) -> Result<()> {
    for (key, value) in answers {
      let element = self
        .element(key)
        .ok_or_else(|| Error::InvalidAnswers(format!("unknown element {key:?}")))?;
      if value.is_null() {
        continue;
      }
      check_answer(element, value)?;
    }

    if completed {
      for element in self.elements().filter(|e| e.required) {
        let answered = match answers.get(&element.name) {
          None | Some(Value::Null) => false,
          Some(Value::String(s)) => !s.trim().is_empty(),
          Some(_) => true,
        };
        if !answered {
          return Err(Error::InvalidAnswers(format!(
            "required element {:?} is unanswered",
            element.name
          )));
        }
      }
    }
    Ok(())
  }
}

fn check_answer(element: &Element, value: &Value) -> Result<()> {
  let ok = match &element.kind {
    ElementKind::Text | ElementKind::Comment => value.is_string(),
    ElementKind::Rating { min, max } => value
      .as_f64()
      .is_some_and(|v| v >= f64::from(*min) && v <= f64::from(*max)),
    ElementKind::Choice { options } => value
      .as_str()
      .is_some_and(|v| options.iter().any(|o| o == v)),
  };
  if ok {
    Ok(())
  } else {
    Err(Error::InvalidAnswers(format!(
      "invalid answer for {:?}: {value}",
      element.name
    )))
  }
}

// ─── Survey ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
  pub survey_id:   Uuid,
  pub tenant_id:   Uuid,
  pub title:       String,
  pub description: Option<String>,
  pub schema:      SurveySchema,
  pub active:      bool,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input for creating or replacing a survey's editable fields.
#[derive(Debug, Clone, Deserialize)]
pub struct SurveyInput {
  pub title:       String,
  pub description: Option<String>,
  pub schema:      SurveySchema,
}
