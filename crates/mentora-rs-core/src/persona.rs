//! Pedagogical persona selection by learner age and grade.
//!
//! The breakpoints are a policy table, not derived logic. Persona variants
//! carry their prompt data directly so callers never branch on flags.

/// Tone/behavior policy shaping prompt phrasing for one learner band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    /// Young learners: narrative tone, enthusiasm welcome.
    YoungLearner,
    /// Early-teen learners: balanced tone.
    EarlyTeen,
    /// Mature and advanced learners: professional tone, no exclamations.
    Mature,
}

/// Upper age bound (inclusive) per band, checked in order.
const AGE_BANDS: [(u8, Persona); 2] = [(10, Persona::YoungLearner), (14, Persona::EarlyTeen)];

/// Upper grade bound (inclusive) per band, used when age is unknown.
const GRADE_BANDS: [(u8, Persona); 2] = [(5, Persona::YoungLearner), (8, Persona::EarlyTeen)];

impl Persona {
    /// Select a persona from the policy table. Unknown age falls back to the
    /// grade table; unknown both defaults to the middle band.
    pub fn select(age: Option<u8>, grade_level: Option<u8>) -> Persona {
        if let Some(age) = age {
            for (bound, persona) in AGE_BANDS {
                if age <= bound {
                    return persona;
                }
            }
            return Persona::Mature;
        }
        if let Some(grade) = grade_level {
            for (bound, persona) in GRADE_BANDS {
                if grade <= bound {
                    return persona;
                }
            }
            return Persona::Mature;
        }
        Persona::EarlyTeen
    }

    /// Stable identifier for logging.
    pub fn id(&self) -> &'static str {
        match self {
            Persona::YoungLearner => "young_learner",
            Persona::EarlyTeen => "early_teen",
            Persona::Mature => "mature",
        }
    }

    /// Whether exclamatory, high-energy language is allowed.
    pub fn enthusiasm_allowed(&self) -> bool {
        match self {
            Persona::YoungLearner => true,
            Persona::EarlyTeen => true,
            Persona::Mature => false,
        }
    }

    /// One-line tone directive for the response-format section.
    pub fn tone(&self) -> &'static str {
        match self {
            Persona::YoungLearner => {
                "Warm and playful; short sentences; stories and pictures in words are welcome."
            }
            Persona::EarlyTeen => {
                "Friendly and encouraging without being childish; concrete examples over stories."
            }
            Persona::Mature => {
                "Professional and measured; no exclamation marks; treat the student as a capable adult."
            }
        }
    }

    /// Persona-specific fragment injected into the methodology section.
    pub fn prompt_fragment(&self) -> &'static str {
        match self {
            Persona::YoungLearner => {
                "Guide with curiosity and wonder. Frame problems as little adventures, \
celebrate each step the student takes, and use everyday objects in examples."
            }
            Persona::EarlyTeen => {
                "Guide with patient questions. Acknowledge effort, connect ideas to things \
the student already knows, and keep explanations grounded and practical."
            }
            Persona::Mature => {
                "Guide with precise questions. Keep a calm, professional register, respect \
the student's reasoning, and avoid exclamatory or effusive language."
            }
        }
    }
}
