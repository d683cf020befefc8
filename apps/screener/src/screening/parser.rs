//! Field parser: turns the oracle's labelled free text into a `CandidateRecord`.
//!
//! Each label is located independently, so field order and surrounding commentary
//! do not matter. A labelled line is the first line that starts with the label once
//! leading whitespace and markdown decoration are stripped; the field value is the
//! rest of that line. Every field has its own rule so format drift stays contained.

use std::fmt;
use once_cell::sync::Lazy;

use regex::Regex;
use thiserror::Error;

use crate::oracle::prompts::{
    EMAIL_LABEL, EXPERIENCE_LABEL, MATCH_PERCENTAGE_LABEL, NAME_LABEL, PHONE_LABEL, SKILLS_LABEL,
};
use crate::screening::models::{CandidateRecord, PHONE_NOT_AVAILABLE};

static EXPERIENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)").unwrap());
static MATCH_PERCENTAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)%").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s\-+()]+").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap()
});

/// Fields without which a response yields no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Name,
    Skills,
    Experience,
    MatchPercentage,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequiredField::Name => NAME_LABEL,
            RequiredField::Skills => SKILLS_LABEL,
            RequiredField::Experience => EXPERIENCE_LABEL,
            RequiredField::MatchPercentage => MATCH_PERCENTAGE_LABEL,
        };
        f.write_str(label.trim_end_matches(':'))
    }
}

/// The response lacked at least one required field, or had it in an unusable shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing or malformed required fields: {}", join_fields(.missing))]
pub struct ParseInvalid {
    pub missing: Vec<RequiredField>,
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses a full oracle response.
pub fn parse_response(raw: &str) -> Result<CandidateRecord, ParseInvalid> {
    let name = labeled_value(raw, NAME_LABEL).and_then(parse_name);
    let skills = labeled_value(raw, SKILLS_LABEL).and_then(parse_skills);
    let experience = labeled_value(raw, EXPERIENCE_LABEL).and_then(parse_experience);
    let match_percentage =
        labeled_value(raw, MATCH_PERCENTAGE_LABEL).and_then(parse_match_percentage);

    match (name, skills, experience, match_percentage) {
        (Some(name), Some((skills_text, skills)), Some(experience_years), Some(match_percentage)) => {
            Ok(CandidateRecord {
                name,
                skills,
                skills_text,
                experience_years,
                match_percentage,
                phone: labeled_value(raw, PHONE_LABEL)
                    .and_then(parse_phone)
                    .unwrap_or_else(|| PHONE_NOT_AVAILABLE.to_string()),
                email: labeled_value(raw, EMAIL_LABEL).and_then(parse_email),
            })
        }
        (name, skills, experience, match_percentage) => {
            let mut missing = Vec::new();
            if name.is_none() {
                missing.push(RequiredField::Name);
            }
            if skills.is_none() {
                missing.push(RequiredField::Skills);
            }
            if experience.is_none() {
                missing.push(RequiredField::Experience);
            }
            if match_percentage.is_none() {
                missing.push(RequiredField::MatchPercentage);
            }
            Err(ParseInvalid { missing })
        }
    }
}

/// Finds the value that follows `label` on its line.
pub fn labeled_value<'a>(raw: &'a str, label: &str) -> Option<&'a str> {
    raw.lines()
        .find_map(|line| strip_decoration(line).strip_prefix(label))
        .map(clean_value)
}

fn strip_decoration(line: &str) -> &str {
    line.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, '*' | '-' | '#' | '>' | '`' | '•')
    })
}

// Oracles like to bold labels (`**Name:** Ada`) and echo the template's brackets.
fn clean_value(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '[' | ']' | '`'))
}

pub fn parse_name(value: &str) -> Option<String> {
    non_empty(value)
}

/// Returns the verbatim skills text and the individual items.
pub fn parse_skills(value: &str) -> Option<(String, Vec<String>)> {
    let text = non_empty(value)?;
    let items = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Some((text, items))
}

pub fn parse_experience(value: &str) -> Option<u32> {
    leading_number(&EXPERIENCE_RE, value)
}

pub fn parse_match_percentage(value: &str) -> Option<u32> {
    leading_number(&MATCH_PERCENTAGE_RE, value)
}

/// Leading run of phone characters; needs at least one digit to count.
pub fn parse_phone(value: &str) -> Option<String> {
    let phone = PHONE_RE.find(value)?.as_str().trim();
    phone
        .chars()
        .any(|c| c.is_ascii_digit())
        .then(|| phone.to_string())
}

pub fn parse_email(value: &str) -> Option<String> {
    EMAIL_RE.find(value).map(|m| m.as_str().to_string())
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn leading_number(re: &Regex, value: &str) -> Option<u32> {
    re.captures(value)?.get(1)?.as_str().parse().ok()
}
