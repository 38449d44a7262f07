//! Native arithmetic skills: `Math.Add` and `Math.Subtract`
//!
//! Both take the default input as the initial value and the `Amount` context
//! variable as the operand. Numbers are 32-bit signed integers written in the
//! invariant "any" number style.

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::skills::{NativeFunction, ParameterDescriptor, Skill, SkillDescriptor};

/// Context variable holding the operand
pub const AMOUNT_VAR: &str = "Amount";

/// Invariant culture currency sign
const CURRENCY: char = '\u{a4}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Subtract,
}

impl Op {
    fn name(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Subtract => "Subtract",
        }
    }

    fn apply(self, lhs: i32, rhs: i32) -> Option<i32> {
        match self {
            Self::Add => lhs.checked_add(rhs),
            Self::Subtract => lhs.checked_sub(rhs),
        }
    }
}

/// Native `Add` / `Subtract` skills
#[derive(Debug, Clone)]
pub struct MathSkill {
    op: Op,
    qualified: String,
}

impl MathSkill {
    /// Default namespace
    pub const NAMESPACE: &'static str = "Math";

    /// Both skills under `Math`
    pub fn skills() -> Vec<Skill> {
        Self::skills_in(Self::NAMESPACE)
    }

    /// Both skills under a custom namespace
    pub fn skills_in(namespace: &str) -> Vec<Skill> {
        [Op::Add, Op::Subtract]
            .into_iter()
            .map(|op| {
                let (verb, what) = match op {
                    Op::Add => ("add", "Adds an amount to a value"),
                    Op::Subtract => ("subtract", "Subtracts an amount from a value"),
                };
                let descriptor = SkillDescriptor::new(namespace, op.name(), what)
                    .parameter(ParameterDescriptor::new("input", format!("The value to {}", verb)))
                    .parameter(ParameterDescriptor::new(AMOUNT_VAR, format!("Amount to {}", verb)));
                let function = MathSkill {
                    op,
                    qualified: descriptor.qualified_name(),
                };
                Skill::native(descriptor, function)
            })
            .collect()
    }
}

#[async_trait]
impl NativeFunction for MathSkill {
    async fn invoke(&self, input: &str, context: &ExecutionContext) -> Result<String> {
        let initial = parse_int(input)
            .ok_or_else(|| Error::invalid_argument(&self.qualified, "initial value not numeric", input))?;

        let raw_amount = context.get(AMOUNT_VAR).unwrap_or_default();
        let amount = parse_int(raw_amount)
            .ok_or_else(|| Error::invalid_argument(&self.qualified, "amount not numeric", raw_amount))?;

        let result = self.op.apply(initial, amount).ok_or_else(|| {
            Error::invalid_argument(
                &self.qualified,
                format!("{} overflows a 32-bit integer", self.op.name()),
                format!("{} {}", initial, amount),
            )
        })?;
        Ok(result.to_string())
    }
}

/// Parse a 32-bit integer in the invariant "any" number style.
///
/// Accepts surrounding whitespace, a leading or trailing sign, parentheses for
/// negatives, the currency sign, `,` group separators, a `.` fraction of zeros
/// and an exponent.
pub fn parse_int(raw: &str) -> Option<i32> {
    let mut s = raw.trim();
    let parenthesized = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => {
            s = inner.trim();
            true
        }
        None => false,
    };
    s = s.trim_matches(CURRENCY).trim();

    let sign = if let Some(rest) = s.strip_prefix(['-', '+']) {
        let sign = s.starts_with('-');
        s = rest;
        Some(sign)
    } else if let Some(rest) = s.strip_suffix(['-', '+']) {
        let sign = s.ends_with('-');
        s = rest;
        Some(sign)
    } else {
        None
    };
    let negative = match (parenthesized, sign) {
        (true, Some(_)) => return None,
        (true, None) => true,
        (false, sign) => sign.unwrap_or(false),
    };
    let s = s.trim_matches(CURRENCY);

    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(at) => (&s[..at], s[at + 1..].parse::<i64>().ok()?),
        None => (s, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    if !int_part.is_empty() && !int_part.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit() || c == ',') {
        return None;
    }
    if !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let digits: Vec<u32> = int_part
        .chars()
        .chain(frac_part.chars())
        .filter_map(|c| c.to_digit(10))
        .collect();
    if digits.is_empty() {
        return None;
    }

    let mut value: i128 = 0;
    for d in digits {
        value = value.checked_mul(10)?.checked_add(i128::from(d))?;
    }

    let scale = exponent - frac_part.len() as i64;
    if value != 0 {
        if scale >= 0 {
            for _ in 0..scale {
                value = value.checked_mul(10)?;
            }
        } else {
            let divisor = 10i128.checked_pow(u32::try_from(-scale).ok()?)?;
            if value % divisor != 0 {
                return None;
            }
            value /= divisor;
        }
    }

    if negative {
        value = -value;
    }
    i32::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str) -> Skill {
        MathSkill::skills()
            .into_iter()
            .find(|s| s.descriptor().name == name)
            .expect("math skill")
    }

    async fn run(name: &str, input: &str, amount: &str) -> Result<String> {
        let ctx = ExecutionContext::new(input).with_variable("amount", amount);
        match skill(name) {
            Skill::Native { function, .. } => function.invoke(input, &ctx).await,
            Skill::Prompt(_) => unreachable!("math skills are native"),
        }
    }

    #[tokio::test]
    async fn test_add_and_subtract() {
        assert_eq!(run("Add", "3", "2").await.expect("add"), "5");
        assert_eq!(run("Subtract", "3", "2").await.expect("subtract"), "1");
        assert_eq!(run("Subtract", "2", "3").await.expect("subtract"), "-1");
    }

    #[tokio::test]
    async fn test_non_numeric_initial_value() {
        let err = run("Add", "abc", "2").await.expect_err("not numeric");
        match err {
            Error::InvalidArgument { skill, message, value } => {
                assert_eq!(skill, "Math.Add");
                assert_eq!(message, "initial value not numeric");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_numeric_amount() {
        let err = run("Subtract", "3", "two").await.expect_err("not numeric");
        assert!(matches!(err, Error::InvalidArgument { ref message, .. } if message == "amount not numeric"));
    }

    #[test]
    fn test_negative_styles_outside_runtime() {
        let out = tokio_test::block_on(run("Add", "-3", "(2)"));
        assert_eq!(tokio_test::assert_ok!(out), "-5");
    }

    #[tokio::test]
    async fn test_overflow_is_rejected() {
        let err = run("Add", "2147483647", "1").await.expect_err("overflow");
        assert!(matches!(err, Error::InvalidArgument { .. }));

        let err = run("Subtract", "-2147483648", "1").await.expect_err("underflow");
        assert!(matches!(
            err,
            Error::InvalidArgument { ref message, .. } if message == "Subtract overflows a 32-bit integer"
        ));
    }

    #[test]
    fn test_number_styles() {
        assert_eq!(parse_int(" 42 "), Some(42));
        assert_eq!(parse_int("1,000"), Some(1000));
        assert_eq!(parse_int("(5)"), Some(-5));
        assert_eq!(parse_int("5-"), Some(-5));
        assert_eq!(parse_int("+7"), Some(7));
        assert_eq!(parse_int("1e3"), Some(1000));
        assert_eq!(parse_int("2.0"), Some(2));
        assert_eq!(parse_int("\u{a4}12"), Some(12));
        assert_eq!(parse_int("-2147483648"), Some(i32::MIN));
    }

    #[test]
    fn test_number_rejects() {
        assert_eq!(parse_int("1.5"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("-"), None);
        assert_eq!(parse_int("(-5)"), None);
        assert_eq!(parse_int("2147483648"), None);
        assert_eq!(parse_int(",5"), None);
    }

    #[test]
    fn test_descriptors() {
        let add = skill("Add");
        let descriptor = add.descriptor();
        assert_eq!(descriptor.qualified_name(), "Math.Add");
        assert_eq!(
            descriptor.find_parameter("amount").map(|p| p.description.as_str()),
            Some("Amount to add")
        );
        assert_eq!(descriptor.parameters[0].description, "The value to add");
    }
}
