//! Report templates and placeholder rendering.
//!
//! Templates are stored HTML with `{{key}}` (escaped) and `{{{key}}}` (raw)
//! placeholders. [`ReportData`] turns the completed submissions for one
//! subject and survey into the values those placeholders resolve to.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
  people::Subject,
  survey::{ElementKind, Survey},
  tenant::Tenant,
};

// ─── Templates ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTemplate {
  pub template_id: Uuid,
  pub tenant_id:   Uuid,
  /// Unique per tenant.
  pub name:        String,
  pub body:        String,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
  pub name: String,
  pub body: String,
}

// ─── Escaping ────────────────────────────────────────────────────────────────

pub fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(c),
    }
  }
  out
}

// ─── Rendering ───────────────────────────────────────────────────────────────

/// Output of [`render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
  pub html:    String,
  /// Placeholder keys that had no value; rendered as empty strings.
  pub missing: Vec<String>,
}

/// Substitute placeholders in `template` from `values`.
///
/// `{{key}}` inserts the HTML-escaped value, `{{{key}}}` inserts it as-is.
/// An opening brace pair with no closing pair is copied through literally.
pub fn render(template: &str, values: &BTreeMap<String, String>) -> Rendered {
  let mut html = String::with_capacity(template.len());
  let mut missing = Vec::new();
  let mut rest = template;

  while let Some(start) = rest.find("{{") {
    html.push_str(&rest[..start]);
    let after = &rest[start..];

    let (raw, open, close) = if after.starts_with("{{{") {
      (true, 3, "}}}")
    } else {
      (false, 2, "}}")
    };

    let Some(end) = after[open..].find(close) else {
      html.push_str(after);
      rest = "";
      break;
    };

    let key = after[open..open + end].trim();
    match values.get(key) {
      Some(v) if raw => html.push_str(v),
      Some(v) => html.push_str(&escape_html(v)),
      None => {
        if !missing.iter().any(|m| m == key) {
          missing.push(key.to_owned());
        }
      }
    }
    rest = &after[open + end + close.len()..];
  }
  html.push_str(rest);

  Rendered { html, missing }
}

// ─── Report data ─────────────────────────────────────────────────────────────

/// One completed submission, tagged with the relationship it came through.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedResponse {
  pub relationship_type: String,
  pub answers:           Map<String, Value>,
}

/// Everything the store gathers for one (subject, survey) report.
#[derive(Debug, Clone)]
pub struct ReportInputs {
  pub tenant:    Tenant,
  pub subject:   Subject,
  pub survey:    Survey,
  /// Active assignments for this subject and survey.
  pub invited:   usize,
  pub responses: Vec<CompletedResponse>,
}

/// Mean score of one rating element across completed responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
  pub name:    String,
  pub title:   String,
  pub average: Option<f64>,
  pub count:   usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportData {
  pub tenant_name:   String,
  pub subject_name:  String,
  pub survey_title:  String,
  pub invited:       usize,
  pub completed:     usize,
  pub ratings:       Vec<RatingSummary>,
  /// Completed response counts per relationship label.
  pub by_relationship: BTreeMap<String, usize>,
  pub generated_at:  DateTime<Utc>,
}

impl ReportData {
  pub fn build(inputs: &ReportInputs, generated_at: DateTime<Utc>) -> Self {
    let ratings = inputs
      .survey
      .schema
      .elements()
      .filter(|e| matches!(e.kind, ElementKind::Rating { .. }))
      .map(|e| {
        let scores: Vec<f64> = inputs
          .responses
          .iter()
          .filter_map(|r| r.answers.get(&e.name).and_then(Value::as_f64))
          .collect();
        let average = (!scores.is_empty())
          .then(|| scores.iter().sum::<f64>() / scores.len() as f64);
        RatingSummary {
          name: e.name.clone(),
          title: e.title.clone(),
          average,
          count: scores.len(),
        }
      })
      .collect();

    let mut by_relationship = BTreeMap::new();
    for r in &inputs.responses {
      *by_relationship.entry(r.relationship_type.clone()).or_insert(0) += 1;
    }

    Self {
      tenant_name: inputs.tenant.name.clone(),
      subject_name: inputs.subject.name.clone(),
      survey_title: inputs.survey.title.clone(),
      invited: inputs.invited,
      completed: inputs.responses.len(),
      ratings,
      by_relationship,
      generated_at,
    }
  }

  /// Completed over invited, as a whole percentage. Zero when nobody was
  /// invited.
  pub fn response_rate(&self) -> u32 {
    if self.invited == 0 {
      0
    } else {
      ((self.completed as f64 / self.invited as f64) * 100.0).round() as u32
    }
  }

  fn rating_table(&self) -> String {
    let mut html = String::from(
      "<table class=\"ratings\">\n<tr><th>Question</th><th>Average</th><th>Responses</th></tr>\n",
    );
    for r in &self.ratings {
      let avg = r
        .average
        .map(|a| format!("{a:.2}"))
        .unwrap_or_else(|| "-".to_owned());
      html.push_str(&format!(
        "<tr><td>{}</td><td>{avg}</td><td>{}</td></tr>\n",
        escape_html(&r.title),
        r.count
      ));
    }
    html.push_str("</table>");
    html
  }

  fn relationship_table(&self) -> String {
    let mut html = String::from(
      "<table class=\"relationships\">\n<tr><th>Relationship</th><th>Responses</th></tr>\n",
    );
    for (label, count) in &self.by_relationship {
      html.push_str(&format!(
        "<tr><td>{}</td><td>{count}</td></tr>\n",
        escape_html(label)
      ));
    }
    html.push_str("</table>");
    html
  }

  /// Placeholder values. Table entries hold markup and are meant for the
  /// raw `{{{...}}}` form.
  pub fn placeholders(&self) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    values.insert("tenant_name".into(), self.tenant_name.clone());
    values.insert("subject_name".into(), self.subject_name.clone());
    values.insert("survey_title".into(), self.survey_title.clone());
    values.insert("invited_count".into(), self.invited.to_string());
    values.insert("completed_count".into(), self.completed.to_string());
    values.insert("response_rate".into(), format!("{}%", self.response_rate()));
    values.insert(
      "generated_at".into(),
      self.generated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
    );
    values.insert("rating_table".into(), self.rating_table());
    values.insert("relationship_table".into(), self.relationship_table());
    for r in &self.ratings {
      if let Some(avg) = r.average {
        values.insert(format!("avg.{}", r.name), format!("{avg:.2}"));
      }
    }
    values
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::survey::SurveySchema;

  fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn escaped_and_raw_placeholders() {
    let out = render(
      "<h1>{{ name }}</h1>{{{table}}}",
      &values(&[("name", "A & B"), ("table", "<table></table>")]),
    );
    assert_eq!(out.html, "<h1>A &amp; B</h1><table></table>");
    assert!(out.missing.is_empty());
  }

  #[test]
  fn missing_keys_render_empty_and_are_reported_once() {
    let out = render("[{{x}}][{{x}}]", &BTreeMap::new());
    assert_eq!(out.html, "[][]");
    assert_eq!(out.missing, vec!["x".to_string()]);
  }

  #[test]
  fn unclosed_placeholder_is_literal() {
    let out = render("a {{b", &values(&[("b", "zzz")]));
    assert_eq!(out.html, "a {{b");
  }

  fn inputs() -> ReportInputs {
    let now = Utc::now();
    let tenant_id = Uuid::new_v4();
    let schema: SurveySchema = serde_json::from_value(json!({
      "pages": [{ "name": "p", "elements": [
        { "name": "overall", "title": "Overall", "kind": "rating", "min": 1, "max": 5 },
        { "name": "notes", "title": "Notes", "kind": "comment" }
      ]}]
    }))
    .unwrap();

    ReportInputs {
      tenant:    Tenant {
        tenant_id,
        slug: "acme".into(),
        name: "Acme".into(),
        active: true,
        created_at: now,
      },
      subject:   Subject {
        subject_id: Uuid::new_v4(),
        tenant_id,
        name: "Bob".into(),
        email: "bob@acme.io".into(),
        active: true,
        created_at: now,
      },
      survey:    Survey {
        survey_id: Uuid::new_v4(),
        tenant_id,
        title: "Leadership".into(),
        description: None,
        schema,
        active: true,
        created_at: now,
        updated_at: now,
      },
      invited:   4,
      responses: vec![
        CompletedResponse {
          relationship_type: "peer".into(),
          answers:           json!({ "overall": 4 }).as_object().unwrap().clone(),
        },
        CompletedResponse {
          relationship_type: "manager".into(),
          answers:           json!({ "overall": 5 }).as_object().unwrap().clone(),
        },
      ],
    }
  }

  #[test]
  fn report_data_aggregates_ratings() {
    let data = ReportData::build(&inputs(), Utc::now());
    assert_eq!(data.completed, 2);
    assert_eq!(data.response_rate(), 50);
    assert_eq!(data.ratings.len(), 1);
    assert_eq!(data.ratings[0].average, Some(4.5));
    assert_eq!(data.by_relationship.get("peer"), Some(&1));

    let vals = data.placeholders();
    assert_eq!(vals["avg.overall"], "4.50");
    assert_eq!(vals["response_rate"], "50%");
    assert!(vals["rating_table"].contains("<td>Overall</td><td>4.50</td>"));
  }

  #[test]
  fn no_invitations_means_zero_rate() {
    let mut i = inputs();
    i.invited = 0;
    i.responses.clear();
    let data = ReportData::build(&i, Utc::now());
    assert_eq!(data.response_rate(), 0);
    assert_eq!(data.ratings[0].average, None);
  }
}
