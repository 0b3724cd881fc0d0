//! The on-stage session record: sub-state, active question selection with
//! its pointer, and per-question annotations keyed by absolute index.

use std::collections::BTreeMap;

use rostrum_core::advisory::AdvisoryReport;
use rostrum_core::questions::QuestionBank;

use crate::error::Rejection;

/// Sub-state of the active candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Admitted, has not pressed start.
    Counting,
    /// Answering questions.
    Interviewing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn step(self, ptr: usize) -> Option<usize> {
        match self {
            Self::Forward => ptr.checked_add(1),
            Self::Backward => ptr.checked_sub(1),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotation {
    pub rating: Option<i32>,
    pub comment: String,
    pub hint_revealed: bool,
}

/// Non-empty, strictly increasing absolute indices plus a pointer that is
/// always a valid position inside them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveQuestionSet {
    indices: Vec<usize>,
    ptr: usize,
}

impl ActiveQuestionSet {
    /// The default selection with the pointer on its first entry.
    pub fn default_for(bank: &QuestionBank) -> Self {
        Self {
            indices: bank.default_selection(),
            ptr: 0,
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn ptr(&self) -> usize {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Absolute index under the pointer.
    pub fn current(&self) -> usize {
        self.indices[self.ptr]
    }

    /// Questions left for the candidate, counting the current one.
    pub fn remaining(&self) -> usize {
        self.indices.len() - self.ptr
    }
}

#[derive(Clone, Debug)]
pub struct SessionState {
    stage: Stage,
    questions: ActiveQuestionSet,
    annotations: BTreeMap<usize, Annotation>,
    // Latest advisory report and the absolute index it was produced for.
    advisory: Option<(usize, AdvisoryReport)>,
}

impl SessionState {
    /// A fresh session for a newly admitted candidate.
    pub fn new(bank: &QuestionBank) -> Self {
        Self {
            stage: Stage::Counting,
            questions: ActiveQuestionSet::default_for(bank),
            annotations: BTreeMap::new(),
            advisory: None,
        }
    }

    /// Reset to `Counting`, the default selection, pointer 0 and no annotations.
    pub fn initialize(&mut self, bank: &QuestionBank) {
        *self = Self::new(bank);
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn questions(&self) -> &ActiveQuestionSet {
        &self.questions
    }

    pub fn current(&self) -> usize {
        self.questions.current()
    }

    pub fn annotation(&self, index: usize) -> Option<&Annotation> {
        self.annotations.get(&index)
    }

    pub fn annotations(&self) -> &BTreeMap<usize, Annotation> {
        &self.annotations
    }

    /// Advisory report for the current question, if the latest one matches it.
    pub fn current_advisory(&self) -> Option<&AdvisoryReport> {
        match &self.advisory {
            Some((index, report)) if *index == self.current() => Some(report),
            _ => None,
        }
    }

    pub fn set_advisory(&mut self, index: usize, report: AdvisoryReport) {
        self.advisory = Some((index, report));
    }

    /// `Counting` -> `Interviewing`.
    pub fn start(&mut self) -> Result<(), Rejection> {
        if self.stage != Stage::Counting {
            return Err(Rejection::NotCounting);
        }
        self.stage = Stage::Interviewing;
        Ok(())
    }

    /// Record the grade for the current question and move the pointer.
    ///
    /// The range check happens first: a rejected move records nothing.
    pub fn advance(
        &mut self,
        direction: Direction,
        rating: Option<i32>,
        comment: String,
    ) -> Result<usize, Rejection> {
        let next = direction
            .step(self.questions.ptr)
            .filter(|p| *p < self.questions.len())
            .ok_or(Rejection::PointerOutOfRange)?;

        self.record_annotation(self.current(), rating, comment);
        self.questions.ptr = next;
        Ok(next)
    }

    /// Replace the active selection, keeping the current absolute index
    /// under the pointer. All-or-nothing: any rejection leaves the
    /// selection and pointer exactly as they were.
    pub fn reselect(&mut self, selection: &[i64], bank_len: usize) -> Result<(), Rejection> {
        let mut indices = Vec::with_capacity(selection.len());
        for &raw in selection {
            let index = usize::try_from(raw)
                .ok()
                .filter(|i| *i < bank_len)
                .ok_or(Rejection::IndexOutOfBounds(raw))?;
            indices.push(index);
        }
        indices.sort_unstable();
        indices.dedup();

        if indices.is_empty() {
            return Err(Rejection::EmptySelection);
        }

        let current = self.current();
        let ptr = indices
            .binary_search(&current)
            .map_err(|_| Rejection::CurrentQuestionDropped(current))?;

        self.questions = ActiveQuestionSet { indices, ptr };
        Ok(())
    }

    /// Mark the hint at `index` as revealed. Idempotent.
    pub fn reveal_hint(&mut self, index: usize) {
        self.annotations.entry(index).or_default().hint_revealed = true;
    }

    /// Overwrite rating and comment at `index`; the hint flag is kept.
    pub fn record_annotation(&mut self, index: usize, rating: Option<i32>, comment: String) {
        let entry = self.annotations.entry(index).or_default();
        entry.rating = rating;
        entry.comment = comment;
    }

    pub fn hint_revealed(&self, index: usize) -> bool {
        self.annotations
            .get(&index)
            .is_some_and(|a| a.hint_revealed)
    }
}
