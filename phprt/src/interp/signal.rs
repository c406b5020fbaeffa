//! Non-local control transfer

use super::error::{InterpResult, PhpError};
use super::value::Value;

/// Outcome of executing a statement
#[derive(Debug, Clone, PartialEq)]
pub enum ControlSignal {
    /// Completed normally; carries the value of an expression statement
    Normal(Value),
    Return(Value),
    /// `break n`: loops still to leave, including the receiving one
    Break(usize),
    Continue(usize),
    Exit(i64),
}

impl ControlSignal {
    pub fn normal() -> Self {
        ControlSignal::Normal(Value::Void)
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, ControlSignal::Normal(_))
    }
}

/// What a loop does with the signal its body produced
#[derive(Debug, Clone, PartialEq)]
pub enum LoopAction {
    Next,
    Stop,
    /// Leave the loop and hand this signal to the enclosing construct
    Propagate(ControlSignal),
}

impl LoopAction {
    /// Consume break/continue levels aimed at the current loop
    pub fn from_signal(signal: ControlSignal) -> Self {
        match signal {
            ControlSignal::Normal(_) | ControlSignal::Continue(1) => LoopAction::Next,
            ControlSignal::Break(1) => LoopAction::Stop,
            ControlSignal::Break(n) => LoopAction::Propagate(ControlSignal::Break(n - 1)),
            ControlSignal::Continue(n) => LoopAction::Propagate(ControlSignal::Continue(n - 1)),
            other => LoopAction::Propagate(other),
        }
    }
}

/// Abnormal completion of an expression: a fatal error or `exit` raised mid-expression
#[derive(Debug, Clone, PartialEq)]
pub enum Unwind {
    Error(PhpError),
    Exit(i64),
}

impl Unwind {
    /// Turn an unwinding expression back into a statement outcome
    pub fn into_signal(self) -> InterpResult<ControlSignal> {
        match self {
            Unwind::Error(err) => Err(err),
            Unwind::Exit(code) => Ok(ControlSignal::Exit(code)),
        }
    }
}

impl From<PhpError> for Unwind {
    fn from(err: PhpError) -> Self {
        Unwind::Error(err)
    }
}

/// Result of evaluating an expression
pub type EvalResult<T> = Result<T, Unwind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_levels() {
        assert_eq!(LoopAction::from_signal(ControlSignal::Break(1)), LoopAction::Stop);
        assert_eq!(
            LoopAction::from_signal(ControlSignal::Break(3)),
            LoopAction::Propagate(ControlSignal::Break(2))
        );
        assert_eq!(LoopAction::from_signal(ControlSignal::Continue(1)), LoopAction::Next);
        assert_eq!(
            LoopAction::from_signal(ControlSignal::Continue(2)),
            LoopAction::Propagate(ControlSignal::Continue(1))
        );
        assert_eq!(
            LoopAction::from_signal(ControlSignal::Return(Value::Int(1))),
            LoopAction::Propagate(ControlSignal::Return(Value::Int(1)))
        );
    }

    #[test]
    fn test_unwind_into_signal() {
        assert_eq!(Unwind::Exit(3).into_signal(), Ok(ControlSignal::Exit(3)));
        let err = Unwind::from(PhpError::fatal("boom")).into_signal().unwrap_err();
        assert_eq!(err.message, "boom");
    }
}
