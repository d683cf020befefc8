// Prompt constants for the screening oracle.
// The six labels below form the response contract the field parser depends on.
// Changing spelling, colon or order breaks compatibility with drop-in oracles.

pub const NAME_LABEL: &str = "Name:";
pub const SKILLS_LABEL: &str = "Skills:";
pub const EXPERIENCE_LABEL: &str = "Experience:";
pub const MATCH_PERCENTAGE_LABEL: &str = "Match Percentage:";
pub const PHONE_LABEL: &str = "Phone Number:";
pub const EMAIL_LABEL: &str = "Email:";

/// Labels in the order they are presented to the oracle.
pub const RESPONSE_LABELS: [&str; 6] = [
    NAME_LABEL,
    SKILLS_LABEL,
    EXPERIENCE_LABEL,
    MATCH_PERCENTAGE_LABEL,
    PHONE_LABEL,
    EMAIL_LABEL,
];

pub const SCREENING_SYSTEM: &str = "\
You are an ATS assistant extracting candidate details from resumes. \
Answer ONLY with the labelled lines you are asked for, one per line. \
Do NOT add explanations, apologies or extra sections.";

/// Screening prompt template. Replace `{resume_text}` and `{job_description}` before sending.
pub const SCREENING_PROMPT_TEMPLATE: &str = r#"Extract the following from the resume below:
- Candidate's full name
- Key skills (max 10, comma-separated)
- Total years of experience
- Match percentage: an integer percentage of how well the candidate matches the job description
- Phone number (if available)
- Email address (if available)

Format:
```
Name: [Candidate Name]
Skills: [Skill1, Skill2, ...]
Experience: [X Years]
Match Percentage: [XX%]
Phone Number: [Phone Number]
Email: [Email Address]
```

Resume Text: {resume_text}
Job Description: {job_description}
"#;

/// Fills the screening template.
pub fn build_screening_prompt(resume_text: &str, job_description: &str) -> String {
    SCREENING_PROMPT_TEMPLATE
        .replace("{resume_text}", resume_text)
        .replace("{job_description}", job_description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_labels_in_contract_order() {
        let prompt = build_screening_prompt("resume", "jd");
        let mut last = 0;
        for label in RESPONSE_LABELS {
            let at = prompt[last..]
                .find(&format!("\n{label} ["))
                .unwrap_or_else(|| panic!("label {label} missing or out of order"))
                + last;
            last = at + 1;
        }
    }

    #[test]
    fn test_prompt_caps_skills_and_asks_for_integer_percentage() {
        let prompt = build_screening_prompt("resume", "jd");
        assert!(prompt.contains("max 10, comma-separated"));
        assert!(prompt.contains("integer percentage"));
        assert!(prompt.contains("job description"));
    }

    #[test]
    fn test_prompt_embeds_resume_and_job_description() {
        let prompt = build_screening_prompt("Rust, 7 years", "Senior backend engineer");
        assert!(prompt.contains("Resume Text: Rust, 7 years"));
        assert!(prompt.contains("Job Description: Senior backend engineer"));
        assert!(!prompt.contains("{resume_text}"));
    }
}
