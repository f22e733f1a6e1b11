//! Fixed-length numeric verification code entry.
//!
//! Models a row of single-digit fields: typing, backspace, arrow navigation
//! and paste. Every content change is reported to an optional callback with
//! the joined code.

use std::fmt;

use thiserror::Error;

/// Length of the email verification codes issued by the server.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Errors from local validation of an entered code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("the code must contain only digits")]
    NonDigit,
    #[error("the code must be exactly {expected} digits long, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// A code that passed local validation and can be sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Validate `code` as exactly `len` decimal digits.
    ///
    /// # Errors
    ///
    /// Returns `CodeError::NonDigit` or `CodeError::WrongLength`.
    pub fn parse(code: &str, len: usize) -> Result<Self, CodeError> {
        if !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(CodeError::NonDigit);
        }
        let actual = code.chars().count();
        if actual != len {
            return Err(CodeError::WrongLength {
                expected: len,
                actual,
            });
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type ChangeCallback = Box<dyn FnMut(&str) + Send + Sync>;

/// State of an N-field code input.
pub struct CodeInput {
    slots: Vec<Option<char>>,
    focus: usize,
    on_change: Option<ChangeCallback>,
}

impl CodeInput {
    /// Create an input with `len` empty fields (at least one).
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len.max(1)],
            focus: 0,
            on_change: None,
        }
    }

    /// Register the callback invoked with the joined code on every change.
    pub fn on_change(mut self, callback: impl FnMut(&str) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(callback));
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Index of the focused field.
    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn digit(&self, index: usize) -> Option<char> {
        self.slots.get(index).copied().flatten()
    }

    /// Joined code; empty fields contribute nothing.
    pub fn code(&self) -> String {
        self.slots.iter().flatten().collect()
    }

    /// Text typed into field `index`. Non-digits are discarded and the last
    /// remaining digit is kept.
    pub fn input(&mut self, index: usize, text: &str) {
        if index >= self.len() {
            return;
        }
        let digit = text.chars().filter(char::is_ascii_digit).last();
        self.slots[index] = digit;
        self.focus = index;
        if digit.is_some() && index + 1 < self.len() {
            self.focus = index + 1;
        }
        self.changed();
    }

    /// Backspace pressed in field `index`.
    pub fn backspace(&mut self, index: usize) {
        if index >= self.len() {
            return;
        }
        if self.slots[index].is_none() && index > 0 {
            self.slots[index - 1] = None;
            self.focus = index - 1;
        } else {
            self.slots[index] = None;
            self.focus = index;
        }
        self.changed();
    }

    pub fn arrow_left(&mut self, index: usize) {
        if index > 0 && index < self.len() {
            self.focus = index - 1;
        }
    }

    pub fn arrow_right(&mut self, index: usize) {
        if index + 1 < self.len() {
            self.focus = index + 1;
        }
    }

    /// Clipboard text pasted into field `index`. Digits are written from
    /// `index` onwards and never past the last field.
    pub fn paste(&mut self, index: usize, text: &str) {
        if index >= self.len() {
            return;
        }
        let mut written = 0;
        for (slot, digit) in self.slots[index..]
            .iter_mut()
            .zip(text.chars().filter(char::is_ascii_digit))
        {
            *slot = Some(digit);
            written += 1;
        }
        if written == 0 {
            return;
        }
        self.focus = (index + written).min(self.len() - 1);
        self.changed();
    }

    /// Clear every field and focus the first one.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.focus = 0;
        self.changed();
    }

    /// Validate the current content for submission.
    ///
    /// # Errors
    ///
    /// Returns `CodeError::WrongLength` while any field is empty.
    pub fn submit(&self) -> Result<VerificationCode, CodeError> {
        VerificationCode::parse(&self.code(), self.len())
    }

    fn changed(&mut self) {
        let code = self.code();
        if let Some(callback) = self.on_change.as_mut() {
            callback(&code);
        }
    }
}

impl Default for CodeInput {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

impl fmt::Debug for CodeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeInput")
            .field("slots", &self.slots)
            .field("focus", &self.focus)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_input(len: usize) -> (CodeInput, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let input = CodeInput::new(len).on_change(move |code| sink.lock().unwrap().push(code.to_string()));
        (input, seen)
    }

    #[test]
    fn test_sequential_digits_concatenate_in_order() {
        let (mut input, seen) = recording_input(6);
        for (i, d) in "482913".chars().enumerate() {
            assert_eq!(input.focus(), i);
            input.input(i, &d.to_string());
        }
        assert_eq!(seen.lock().unwrap().last().unwrap(), "482913");
        assert_eq!(input.focus(), 5);
        assert_eq!(input.submit().unwrap().as_str(), "482913");
    }

    #[test]
    fn test_typing_strips_non_digits() {
        let (mut input, seen) = recording_input(4);
        input.input(0, "a");
        assert_eq!(input.digit(0), None);
        assert_eq!(input.focus(), 0);
        input.input(0, "x7");
        assert_eq!(input.digit(0), Some('7'));
        assert_eq!(input.focus(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_typing_in_last_field_keeps_focus() {
        let mut input = CodeInput::new(3);
        input.input(2, "9");
        assert_eq!(input.focus(), 2);
    }

    #[test]
    fn test_typing_focuses_the_typed_field() {
        let mut input = CodeInput::new(6);
        input.input(3, "x");
        assert_eq!(input.focus(), 3);
        input.input(5, "4");
        assert_eq!(input.focus(), 5);
        input.input(1, "2");
        assert_eq!(input.focus(), 2);
    }

    #[test]
    fn test_gaps_are_skipped_in_join() {
        let mut input = CodeInput::new(4);
        input.input(0, "1");
        input.input(2, "3");
        assert_eq!(input.code(), "13");
        assert_eq!(
            input.submit(),
            Err(CodeError::WrongLength { expected: 4, actual: 2 })
        );
    }

    #[test]
    fn test_backspace_on_empty_moves_back_and_clears() {
        let mut input = CodeInput::new(6);
        input.paste(0, "123");
        input.backspace(3);
        assert_eq!(input.focus(), 2);
        assert_eq!(input.digit(2), None);
        assert_eq!(input.code(), "12");
    }

    #[test]
    fn test_backspace_on_filled_clears_only_that_field() {
        let mut input = CodeInput::new(6);
        input.paste(0, "123");
        input.arrow_left(3);
        input.backspace(2);
        assert_eq!(input.focus(), 2);
        assert_eq!(input.digit(1), Some('2'));
        assert_eq!(input.digit(2), None);
    }

    #[test]
    fn test_backspace_on_first_empty_field_stays() {
        let mut input = CodeInput::new(6);
        input.backspace(0);
        assert_eq!(input.focus(), 0);
        assert!(input.is_empty());
    }

    #[test]
    fn test_arrows_move_focus_without_touching_content() {
        let mut input = CodeInput::new(3);
        input.paste(0, "12");
        input.arrow_left(2);
        assert_eq!(input.focus(), 1);
        input.arrow_left(0);
        assert_eq!(input.focus(), 1);
        input.arrow_right(1);
        assert_eq!(input.focus(), 2);
        input.arrow_right(2);
        assert_eq!(input.focus(), 2);
        assert_eq!(input.code(), "12");
    }

    #[test]
    fn test_paste_writes_only_digits_and_clamps() {
        let (mut input, seen) = recording_input(6);
        input.paste(2, "9a-8 7x6543");
        assert_eq!(input.digit(0), None);
        assert_eq!(input.digit(1), None);
        assert_eq!(input.code(), "9876");
        assert_eq!(input.focus(), 5);
        assert_eq!(*seen.lock().unwrap(), vec!["9876".to_string()]);
    }

    #[test]
    fn test_paste_focus_after_last_written_digit() {
        let mut input = CodeInput::new(6);
        input.paste(1, "12");
        assert_eq!(input.focus(), 3);
    }

    #[test]
    fn test_paste_without_digits_is_noop() {
        let (mut input, seen) = recording_input(6);
        input.paste(0, "abc");
        assert!(input.is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let mut input = CodeInput::new(2);
        input.input(5, "1");
        input.backspace(5);
        input.paste(5, "12");
        assert!(input.is_empty());
    }

    #[test]
    fn test_verification_code_rejects_non_digits() {
        assert_eq!(VerificationCode::parse("12a456", 6), Err(CodeError::NonDigit));
        assert!(VerificationCode::parse("123456", 6).is_ok());
    }
}
