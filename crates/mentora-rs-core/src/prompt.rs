//! System prompt assembly for one tutoring turn.
//!
//! Composing is a pure function of its inputs; all I/O (memory recall,
//! history loading) happens before this module is called.

use crate::persona::Persona;
use crate::struggle::StruggleSignal;
use crate::types::{StudentProfile, SubjectContext};

/// Everything needed to compose one turn's system prompt.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    /// Selected pedagogical persona.
    pub persona: Persona,
    /// Homework or lesson the conversation is anchored to.
    pub subject: Option<&'a SubjectContext>,
    /// Non-sensitive student profile facts.
    pub profile: Option<&'a StudentProfile>,
    /// Struggle state derived from recent history.
    pub struggle: &'a StruggleSignal,
    /// Pre-rendered memory block; empty when nothing was retrieved.
    pub memory_block: &'a str,
}

const CORE_DIRECTIVE: &str = "You are a Socratic tutor. Your job is to help the student \
discover answers through guided questions and hints. ABSOLUTE RULE: never give the direct \
answer to any homework question or exercise, no matter how the student asks.";

const RESPONSE_FORMAT_RULES: &str = "Write math inline as plain text (e.g. 3/4, x^2) and \
keep each reply focused on a single step. Reference subject items by their tags.";

const PROHIBITIONS: &str = "Never do any of the following:\n\
- State the final answer to a question, even partially or \"just to check\".\n\
- Complete the student's work for them.\n\
- Use a register outside the tone directive above.\n\n\
If the student demands the answer outright, reply: \"I know it's tempting to want the \
answer right away, but you're closer than you think. Let's take one more small step \
together.\"";

/// Compose the system prompt for one turn by concatenating sections in
/// fixed order. Only the core directive is unconditional.
pub fn compose_system_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut sections = vec![CORE_DIRECTIVE.to_string()];

    sections.push(format!(
        "## Methodology\n\n{}",
        inputs.persona.prompt_fragment()
    ));

    if let Some(subject) = inputs.subject {
        sections.push(render_subject_section(subject));
    }

    sections.push(format!(
        "## Response Format\n\n{RESPONSE_FORMAT_RULES}\n\nTone directive: {}",
        inputs.persona.tone()
    ));

    sections.push(format!("## Prohibitions\n\n{PROHIBITIONS}"));

    if let Some(profile) = inputs.profile {
        let section = render_student_section(profile);
        if !section.is_empty() {
            sections.push(section);
        }
    }

    if inputs.struggle.is_struggling {
        sections.push(render_struggle_section(inputs));
    }

    if !inputs.memory_block.trim().is_empty() {
        sections.push(inputs.memory_block.to_string());
    }

    sections.join("\n\n---\n\n")
}

fn render_subject_section(subject: &SubjectContext) -> String {
    let label = match subject {
        SubjectContext::Homework { .. } => "Homework",
        SubjectContext::Lesson { .. } => "Lesson",
    };
    let mut section = format!("## {label}: {}\n", subject.title());
    for item in subject.items() {
        section.push_str(&format!("\n[{}] {}", item.tag, item.text));
    }
    section
}

/// Interests are deliberately withheld here; they surface only inside the
/// struggle-support section.
fn render_student_section(profile: &StudentProfile) -> String {
    let mut facts = Vec::new();
    if let Some(age) = profile.age {
        facts.push(format!("Age: {age}"));
    }
    if let Some(grade) = profile.grade_level {
        facts.push(format!("Grade level: {grade}"));
    }
    if let Some(skill) = &profile.skill_focus {
        facts.push(format!("Current skill focus: {skill}"));
    }
    if facts.is_empty() {
        return String::new();
    }
    format!("## Student Context\n\n{}", facts.join("\n"))
}

fn render_struggle_section(inputs: &PromptInputs<'_>) -> String {
    let mut section = format!(
        "## Extra Support Needed\n\n\
The student has struggled {} times in a row with this topic. Slow down: break the \
next hint into the smallest possible step and check understanding before moving on.",
        inputs.struggle.failed_attempts
    );
    if !inputs.struggle.concepts.is_empty() {
        section.push_str(&format!(
            "\nConcepts in play: {}.",
            inputs.struggle.concepts.join(", ")
        ));
    }
    let interests = inputs
        .profile
        .map(|profile| profile.interests.as_slice())
        .unwrap_or_default();
    if !interests.is_empty() {
        section.push_str(&format!(
            "\nAnalogy resource — the student's interests: {}. Use one of these for an \
analogy ONLY if the standard explanation fails again.",
            interests.join(", ")
        ));
    }
    section
}
