//! Prompts for the resume scoring call.
//!
//! The system prompt pins down the role and, critically, the exact JSON
//! shape of the reply. The point weights behind each component are the
//! model's rubric; nothing downstream validates them.

pub const SYSTEM_PROMPT: &str = r#"You are an AI resume matching system with a transparent scoring methodology. You evaluate one candidate resume against one job description and score it across five components: technical skills, experience, education, soft skills, and certifications, plus red flags and bonus points.

Respond with a single JSON object in exactly this shape:

{
  "name": "candidate first and last name",
  "score": {
    "value": 0-100,
    "components": {
      "technical_skills": {"score": 0-50, "matched": [], "missing": []},
      "experience": {"score": 0-20, "years": number, "field": string, "company": string},
      "education": {"score": 0-10, "degree": string},
      "soft_skills": {"score": 0-10, "matched": []},
      "certifications": {"score": 0-10, "items": []}
    },
    "red_flags": {"critical": [], "moderate": [], "minor": []},
    "bonus_points": number
  },
  "analysis": {
    "strengths": [],
    "weaknesses": [],
    "suggestions": []
  }
}"#;

const USER_PROMPT_TEMPLATE: &str = "Job Description: {jd_text} \
Candidate Resume: {resume_text} \
Ensure the JSON output does not contain escaped characters like \\n, \\\\, or \\/. \
The response must be plain, readable JSON with standard characters only. \
Output only a clean and valid JSON object. \
Do not include markdown formatting (like ```json). \
Do not include explanations or extra text before or after the JSON. \
Ensure all brackets, quotes, and commas are properly placed. \
Make sure the 'name' field contains the candidate's full name. \
Return the name of the university along with the degree of the candidate. \
Avoid duplicate keys. Ensure each section appears only once and is correctly structured. \
Please analyze and score this candidate as per the criteria in the system prompt. \
Return a detailed JSON with score components, red flags, bonus points, and analysis.";

/// Builds the user prompt for one (job description, resume) pair.
pub fn build_user_prompt(jd_text: &str, resume_text: &str) -> String {
    USER_PROMPT_TEMPLATE
        .replace("{jd_text}", jd_text)
        .replace("{resume_text}", resume_text)
}
