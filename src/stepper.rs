use std::fmt;

use crate::wizard::Step;

/// One-line progress header, e.g. `(1) Company Details ─ [2] Bill To ─ ...`.
pub struct StepIndicator<'a> {
    steps: &'a [Step],
    current: Step,
}

impl<'a> StepIndicator<'a> {
    pub fn new(steps: &'a [Step], current: Step) -> Self {
        Self { steps, current }
    }
}

impl fmt::Display for StepIndicator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" ─ ")?;
            }
            if *step == self.current {
                write!(f, "[{}] {}", i + 1, step.title())?;
            } else {
                write!(f, "({}) {}", i + 1, step.title())?;
            }
        }
        Ok(())
    }
}
