//! Property-based tests for intent resolution
//!
//! Invariants:
//! - Any run of three or more digits is a student number lookup
//! - Shorter digit runs never trigger a lookup
//! - Term canonicalisation is idempotent and whitespace-free
//! - A fully specified payment request round-trips its arguments
//! - Confirmation only ever pays a balance that was quoted

use super::intent::{resolve, resolve_pending_payment, Action};
use crate::services::{canonical_term, PaymentRequest};
use crate::session::{ConversationTurn, MessageType};
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;

fn arb_season() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("Fall"), Just("Spring"), Just("fall"), Just("SPRING")]
}

proptest! {
    #[test]
    fn long_digit_runs_fetch_tuition(
        digits in "[0-9]{3,12}",
        pad_left in " {0,3}",
        pad_right in " {0,3}",
    ) {
        let utterance = format!("{pad_left}{digits}{pad_right}");
        prop_assert_eq!(resolve(&utterance), Action::FetchTuition { student_no: digits });
    }

    #[test]
    fn short_digit_runs_do_not_fetch(digits in "[0-9]{0,2}") {
        let is_fetch = matches!(resolve(&digits), Action::FetchTuition { .. });
        prop_assert!(!is_fetch);
    }

    #[test]
    fn canonical_term_is_idempotent(term in "[A-Za-z]{0,8}[ \t]{0,3}[0-9]{0,4}[ ]{0,2}") {
        let once = canonical_term(&term);
        prop_assert_eq!(canonical_term(&once), once.clone());
        prop_assert!(!once.chars().any(char::is_whitespace));
    }

    #[test]
    fn payment_arguments_are_extracted(
        student in "[1-9][0-9]{2,7}",
        amount in 1u32..100_000,
        season in arb_season(),
        year in 2000u32..2100,
        spaced in any::<bool>(),
    ) {
        let sep = if spaced { " " } else { "" };
        let utterance = format!("pay student {student} ${amount} {season}{sep}{year}");

        let Action::PayTuition(payment) = resolve(&utterance) else {
            return Err(TestCaseError::fail(format!("no payment for {utterance:?}")));
        };
        prop_assert_eq!(&payment.student_no, &student);
        prop_assert_eq!(payment.amount, Decimal::from(amount));
        prop_assert!(payment.term().ends_with(&year.to_string()));
        prop_assert!(!payment.term().contains(' '));
    }

    #[test]
    fn confirmation_pays_only_outstanding_quotes(
        student in "[1-9][0-9]{2,7}",
        balance in 0u32..10_000,
        filler in proptest::collection::vec("[a-z ]{1,20}", 0..10),
    ) {
        let mut history: Vec<ConversationTurn> = vec![ConversationTurn::assistant(
            "Here is the tuition information:",
            MessageType::TuitionCard,
            Some(json!({
                "student_no": student.clone(),
                "tuitions": [{ "term": "Fall2024", "balance": balance }]
            })),
        )];
        history.extend(filler.into_iter().map(ConversationTurn::user));

        let pending = resolve_pending_payment(&history);
        if balance == 0 {
            prop_assert_eq!(pending, None);
        } else {
            prop_assert_eq!(
                pending,
                Some(PaymentRequest::new(student, Decimal::from(balance), "Fall2024"))
            );
        }
    }
}
