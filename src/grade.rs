use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Why a grade cell holds no grade. Display only; arithmetic treats every
// reason the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoGrade {
    NotAGrade,
    Exempt,
    NotApplicable,
}

// The thirteen letter grades the portal can print instead of a number,
// declared best first so `A+ < A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    APlus,
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    DPlus,
    D,
    DMinus,
    F,
}

const LETTERS: [(LetterGrade, &str); 13] = [
    (LetterGrade::APlus, "A+"),
    (LetterGrade::A, "A"),
    (LetterGrade::AMinus, "A-"),
    (LetterGrade::BPlus, "B+"),
    (LetterGrade::B, "B"),
    (LetterGrade::BMinus, "B-"),
    (LetterGrade::CPlus, "C+"),
    (LetterGrade::C, "C"),
    (LetterGrade::CMinus, "C-"),
    (LetterGrade::DPlus, "D+"),
    (LetterGrade::D, "D"),
    (LetterGrade::DMinus, "D-"),
    (LetterGrade::F, "F"),
];

impl LetterGrade {
    // "B+" -> `BPlus`; exact match only.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        LETTERS
            .iter()
            .find(|(_, s)| *s == symbol)
            .map(|(letter, _)| *letter)
    }

    pub fn symbol(self) -> &'static str {
        LETTERS
            .iter()
            .find(|(letter, _)| *letter == self)
            .map(|(_, s)| *s)
            .unwrap_or("")
    }
}

// A single grade as printed by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GradeValue {
    None(NoGrade),
    Integer(i32),
    Fractional(f64),
    Letter(LetterGrade),
}

impl Default for GradeValue {
    fn default() -> Self {
        GradeValue::None(NoGrade::NotAGrade)
    }
}

impl GradeValue {
    // Integer first, then a finite decimal, then a letter; anything else is
    // "not a grade". Out-of-range numbers are kept as they are.
    pub fn parse(text: &str) -> GradeValue {
        if let Ok(value) = text.parse::<i32>() {
            return GradeValue::Integer(value);
        }
        if let Ok(value) = text.parse::<f64>() {
            if value.is_finite() {
                return GradeValue::Fractional(value);
            }
        }
        match LetterGrade::from_symbol(text) {
            Some(letter) => GradeValue::Letter(letter),
            None => GradeValue::None(NoGrade::NotAGrade),
        }
    }

    // Blank, exempt, or anything else that is not a grade.
    pub fn is_none(&self) -> bool {
        matches!(self, GradeValue::None(_))
    }

    // The value usable in arithmetic. Letters and missing grades have none.
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            GradeValue::Integer(value) => Some(f64::from(value)),
            GradeValue::Fractional(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match *self {
            GradeValue::Integer(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for GradeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeValue::None(_) => Ok(()),
            GradeValue::Integer(value) => write!(f, "{value}"),
            GradeValue::Fractional(value) => write!(f, "{value}"),
            GradeValue::Letter(letter) => f.write_str(letter.symbol()),
        }
    }
}

impl FromStr for GradeValue {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(GradeValue::parse(s))
    }
}
