//! The static question bank.
//!
//! Questions are addressed by their absolute index `0..len`. The bank is
//! loaded once at startup and never mutated afterwards, so it is shared
//! behind an `Arc` by everything that renders views.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One interview question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Prompt read out to the candidate.
    pub main_text: String,
    /// Grading keywords, shown only to the interviewer.
    #[serde(default)]
    pub keyword_hints: String,
    /// Hint the interviewer may reveal to the candidate.
    #[serde(default)]
    pub candidate_hint: String,
}

impl Question {
    pub fn new(
        main_text: impl Into<String>,
        keyword_hints: impl Into<String>,
        candidate_hint: impl Into<String>,
    ) -> Self {
        Self {
            main_text: main_text.into(),
            keyword_hints: keyword_hints.into(),
            candidate_hint: candidate_hint.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QuestionBankError {
    #[error("failed to read question file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse question file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("question bank is empty")]
    Empty,

    #[error("question {index} has an empty main text")]
    InvalidQuestion { index: usize },
}

/// Ordered, immutable collection of questions.
#[derive(Clone, Debug)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Build a bank, rejecting an empty list or blank prompts.
    pub fn new(questions: Vec<Question>) -> Result<Self, QuestionBankError> {
        if questions.is_empty() {
            return Err(QuestionBankError::Empty);
        }
        if let Some(index) = questions
            .iter()
            .position(|q| q.main_text.trim().is_empty())
        {
            return Err(QuestionBankError::InvalidQuestion { index });
        }
        Ok(Self { questions })
    }

    /// Parse a JSON array of questions.
    pub fn from_json_str(json: &str) -> Result<Self, QuestionBankError> {
        let questions: Vec<Question> = serde_json::from_str(json)?;
        Self::new(questions)
    }

    /// Load a JSON question file from disk.
    pub fn load(path: &Path) -> Result<Self, QuestionBankError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// The bank shipped with the binary.
    pub fn builtin() -> Self {
        Self {
            questions: builtin_questions(),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn contains_index(&self, index: usize) -> bool {
        index < self.questions.len()
    }

    /// Main texts of every question, in absolute order.
    pub fn main_texts(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.main_text.clone()).collect()
    }

    /// Every even absolute index. Never empty for a valid bank.
    pub fn default_selection(&self) -> Vec<usize> {
        (0..self.questions.len()).step_by(2).collect()
    }

    /// Positional titles ("1", "2", ...) for an active selection.
    pub fn titles_for(&self, selection: &[usize]) -> Vec<String> {
        (1..=selection.len()).map(|n| n.to_string()).collect()
    }
}

fn builtin_questions() -> Vec<Question> {
    vec![
        Question::new(
            "Briefly analyse how artificial intelligence will affect society.",
            "Technology and social structure: employment, education, healthcare, fairness, skill displacement, digital divide. \
             Ethics and law: privacy, regulation, the limits of automation. \
             Outlook: a personal, reasoned position on where AI is heading.",
            "Pick one industry you know well and walk through how it would change.",
        ),
        Question::new(
            "What is your view on hyper-competition in work and study?",
            "Competition and efficiency: resource allocation, workplace culture, education pressure. \
             Individual and collective responses: constructive alternatives. \
             Critical reflection grounded in personal experience.",
            "Think about a time you felt you were running just to stay in place.",
        ),
        Question::new(
            "Can environmental protection and economic growth go together?",
            "Systems thinking: tension between sustainability and profit, paths to balance. \
             Evidence: real cases or policies, short versus long term effects. \
             Values: ecological responsibility and actionable proposals.",
            "Consider a city or company that changed its energy mix.",
        ),
        Question::new(
            "How do you stay mentally healthy under pressure?",
            "Emotional awareness: sources of stress, regulation techniques such as planning or meditation. \
             Seeking support: using other people and outside resources. \
             Growth: what was learned from stressful periods.",
            "Describe your last deadline week and what helped.",
        ),
        Question::new(
            "How do you see remote work?",
            "Self-management: efficiency, discipline, time management. \
             Communication: strategies for remote collaboration and team belonging. \
             Balanced view: trade-offs by industry and role.",
            "Compare a productive remote day with an unproductive one.",
        ),
        Question::new(
            "What effect does social media have on teenagers?",
            "Several dimensions: mental health, information access, social skills. \
             Balanced judgement: weighing benefits and harms. \
             Constructive guidance: rules or habits for healthy use.",
            "Think about how you used social media at fifteen.",
        ),
        Question::new(
            "What value does traditional culture hold in modern society?",
            "Identity and adaptation: traditional elements in contemporary life such as festivals or design. \
             Innovation versus heritage: modern expression through technology or markets. \
             Personal connection to tradition.",
            "Name a tradition your family still keeps and why.",
        ),
        Question::new(
            "If you designed a new course, what would it be?",
            "Insight into needs: student pain points and a clear purpose. \
             Design: new teaching methods, cross-disciplinary or project-based learning. \
             Feasibility: delivery, assessment and real value.",
            "Start from a skill you wish you had been taught earlier.",
        ),
        Question::new(
            "What does lifelong learning mean for working professionals?",
            "Motivation and adaptability in a fast-changing workplace. \
             Method: reading, courses, practice, feedback loops. \
             Career perspective: transitions and skill renewal.",
            "Describe the last thing you learned outside of work.",
        ),
        Question::new(
            "Tell us about an experience that changed your mind.",
            "Self-awareness: cause, turning point and outcome of the change. \
             Growth: lasting lessons drawn from the event. \
             Authenticity: concrete, honest and reflective storytelling.",
            "Focus on what you believed before and what convinced you otherwise.",
        ),
    ]
}
